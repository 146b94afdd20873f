//! Error types for candidate-adapters

use candidate_engine::EngineError;
use thiserror::Error;

/// Errors raised while talking to an external endpoint.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// No API key configured for an endpoint that requires one
    #[error("missing API key (set {0})")]
    MissingApiKey(&'static str),

    /// Transport failure: DNS, connect, TLS, timeout
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success status from the endpoint
    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Body did not have the expected shape
    #[error("malformed response: {0}")]
    Malformed(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        AdapterError::Http(err.to_string())
    }
}

impl AdapterError {
    pub fn into_generator(self) -> EngineError {
        EngineError::generator(self.to_string())
    }

    pub fn into_verifier(self) -> EngineError {
        EngineError::verifier(self.to_string())
    }

    pub fn into_lookup(self) -> EngineError {
        EngineError::lookup(self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AdapterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_maps_to_transport_variants() {
        let err = AdapterError::Status {
            status: 503,
            body: "overloaded".to_string(),
        };
        let mapped = err.into_generator();
        assert!(mapped.is_transport());
        assert!(mapped.to_string().contains("503"));

        let mapped = AdapterError::Malformed("no choices".to_string()).into_lookup();
        assert!(matches!(mapped, EngineError::LookupUnavailable { .. }));
    }
}
