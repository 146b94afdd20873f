//! Reachability checks for candidate URLs.

use std::time::Duration;

use candidate_engine::{EngineError, VerificationVerdict};
use tracing::debug;

use crate::error::Result as AdapterResult;
use crate::http::build_client;

/// Whether `url` is an http(s) URL with something after the scheme.
pub fn is_http_url(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    let host = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"));
    matches!(host, Some(rest) if !rest.is_empty())
}

/// Issues `HEAD` requests, following redirects, and maps the final status
/// to a verdict.
#[derive(Debug, Clone)]
pub struct LinkVerifier {
    http: reqwest::Client,
}

impl LinkVerifier {
    pub fn new() -> AdapterResult<Self> {
        Ok(LinkVerifier {
            http: build_client()?,
        })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        LinkVerifier { http }
    }

    /// 2xx is valid, any other status invalid. Transport failures are
    /// `VerifierUnavailable`, left to the engine's failure policy.
    pub async fn check(
        &self,
        url: &str,
        timeout: Duration,
    ) -> candidate_engine::Result<VerificationVerdict> {
        let url = url.trim();
        if !is_http_url(url) {
            return Ok(VerificationVerdict::invalid(format!(
                "not an http(s) URL: {url:?}"
            )));
        }

        let response = self
            .http
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| EngineError::verifier(format!("HEAD {url}: {e}")))?;

        let status = response.status();
        debug!(url, status = status.as_u16(), "link checked");
        if status.is_success() {
            Ok(VerificationVerdict::valid(format!("{url} responded {status}")))
        } else {
            Ok(VerificationVerdict::invalid(format!(
                "{url} responded {status}"
            )))
        }
    }
}
