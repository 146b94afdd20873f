//! Error taxonomy for the candidate engine.

/// Candidate engine errors.
///
/// The `*Unavailable` variants are produced by adapters for transport-level
/// failures and are absorbed by the engine as failed attempts or empty
/// branches. Only [`EngineError::NoValidCandidate`] escapes a logical request.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("generator unavailable: {reason}")]
    GeneratorUnavailable { reason: String },

    #[error("verifier unavailable: {reason}")]
    VerifierUnavailable { reason: String },

    #[error("lookup unavailable: {reason}")]
    LookupUnavailable { reason: String },

    #[error("no valid candidate after {attempts} attempt(s)")]
    NoValidCandidate { attempts: u32 },

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn generator(reason: impl Into<String>) -> Self {
        EngineError::GeneratorUnavailable {
            reason: reason.into(),
        }
    }

    pub fn verifier(reason: impl Into<String>) -> Self {
        EngineError::VerifierUnavailable {
            reason: reason.into(),
        }
    }

    pub fn lookup(reason: impl Into<String>) -> Self {
        EngineError::LookupUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether this error is a transport-level collaborator failure.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            EngineError::GeneratorUnavailable { .. }
                | EngineError::VerifierUnavailable { .. }
                | EngineError::LookupUnavailable { .. }
        )
    }
}

/// Result type for candidate engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
