//! Shared HTTP client construction.

use std::time::Duration;

use crate::error::{AdapterError, Result};

/// User agent sent on every outbound request. Nominatim rejects anonymous clients.
pub const USER_AGENT: &str = concat!("candidates/", env!("CARGO_PKG_VERSION"));

const MAX_BODY_CHARS: usize = 200;

/// Build a client. Per-request timeouts are applied at the call site.
pub fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(AdapterError::from)
}

/// Read the body of a response, turning non-success statuses into errors.
pub async fn success_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let text = response.text().await?;
    if status.is_success() {
        Ok(text)
    } else {
        Err(AdapterError::Status {
            status: status.as_u16(),
            body: truncate_chars(&text, MAX_BODY_CHARS),
        })
    }
}

pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let prefix: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{prefix}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_client_builds_without_network() {
        assert!(build_client().is_ok());
        assert!(USER_AGENT.starts_with("candidates/"));
    }
}
