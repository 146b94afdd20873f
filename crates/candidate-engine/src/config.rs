//! Engine configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at all)
//! yields the reference policies: 3 attempts, batches of 5-7 verified out of
//! 10 requested, and up to 5 expanded search queries. Timeouts are in
//! milliseconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregator::BatchPolicy;
use crate::domain::{EngineError, Result};
use crate::retry::RetryPolicy;
use crate::search::SearchPolicy;
use crate::verifier::VerifierFailurePolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub call_timeout_ms: u64,
    pub on_verifier_error: VerifierFailurePolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            call_timeout_ms: policy.call_timeout.as_millis() as u64,
            on_verifier_error: policy.on_verifier_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub target_min: usize,
    pub target_max: usize,
    pub request_count: usize,
    pub batch_retries: u32,
    pub call_timeout_ms: u64,
    pub on_verifier_error: VerifierFailurePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let policy = BatchPolicy::default();
        Self {
            target_min: policy.target_min,
            target_max: policy.target_max,
            request_count: policy.request_count,
            batch_retries: policy.batch_retries,
            call_timeout_ms: policy.call_timeout.as_millis() as u64,
            on_verifier_error: policy.on_verifier_error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_queries: usize,
    pub include_original: bool,
    pub allowed_categories: Vec<String>,
    pub call_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let policy = SearchPolicy::default();
        Self {
            max_queries: policy.max_queries,
            include_original: policy.include_original,
            allowed_categories: policy.allowed_categories,
            call_timeout_ms: policy.call_timeout.as_millis() as u64,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub search: SearchConfig,
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{key}: cannot parse {value:?}")))
}

impl EngineConfig {
    /// Parse TOML without validating, for callers that layer overrides on top.
    pub fn parse_toml(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| EngineError::Config(e.to_string()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config = Self::parse_toml(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file without validating.
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse_toml(&raw)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `CANDIDATES_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from any key/value source (the environment in production).
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get("CANDIDATES_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse_env("CANDIDATES_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = get("CANDIDATES_CALL_TIMEOUT_MS") {
            let ms: u64 = parse_env("CANDIDATES_CALL_TIMEOUT_MS", &v)?;
            self.retry.call_timeout_ms = ms;
            self.batch.call_timeout_ms = ms;
            self.search.call_timeout_ms = ms;
        }
        if let Some(v) = get("CANDIDATES_BATCH_MIN") {
            self.batch.target_min = parse_env("CANDIDATES_BATCH_MIN", &v)?;
        }
        if let Some(v) = get("CANDIDATES_BATCH_MAX") {
            self.batch.target_max = parse_env("CANDIDATES_BATCH_MAX", &v)?;
        }
        if let Some(v) = get("CANDIDATES_BATCH_REQUEST") {
            self.batch.request_count = parse_env("CANDIDATES_BATCH_REQUEST", &v)?;
        }
        if let Some(v) = get("CANDIDATES_BATCH_RETRIES") {
            self.batch.batch_retries = parse_env("CANDIDATES_BATCH_RETRIES", &v)?;
        }
        if let Some(v) = get("CANDIDATES_SEARCH_MAX_QUERIES") {
            self.search.max_queries = parse_env("CANDIDATES_SEARCH_MAX_QUERIES", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.retry_policy().validate()?;
        self.batch_policy().validate()?;
        self.search_policy().validate()?;
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            call_timeout: Duration::from_millis(self.retry.call_timeout_ms),
            on_verifier_error: self.retry.on_verifier_error,
        }
    }

    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            target_min: self.batch.target_min,
            target_max: self.batch.target_max,
            request_count: self.batch.request_count,
            batch_retries: self.batch.batch_retries,
            call_timeout: Duration::from_millis(self.batch.call_timeout_ms),
            on_verifier_error: self.batch.on_verifier_error,
        }
    }

    pub fn search_policy(&self) -> SearchPolicy {
        SearchPolicy {
            max_queries: self.search.max_queries,
            include_original: self.search.include_original,
            allowed_categories: self.search.allowed_categories.clone(),
            call_timeout: Duration::from_millis(self.search.call_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_reference_policies() {
        let config = EngineConfig::default();
        assert_eq!(config.retry_policy(), RetryPolicy::default());
        assert_eq!(config.batch_policy(), BatchPolicy::default());
        assert_eq!(config.search_policy(), SearchPolicy::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [retry]
            max_attempts = 5
            on_verifier_error = "fail_open"

            [search]
            allowed_categories = ["amenity", "office"]
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.on_verifier_error, VerifierFailurePolicy::FailOpen);
        assert_eq!(config.batch, BatchConfig::default());
        assert_eq!(config.search.allowed_categories, vec!["amenity", "office"]);
        assert_eq!(config.search.max_queries, 5);
    }

    #[test]
    fn test_invalid_toml_policy_is_rejected() {
        let err = EngineConfig::from_toml_str("[batch]\ntarget_min = 9\ntarget_max = 7\n")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidPolicy(_)));

        let err = EngineConfig::from_toml_str("[retry]\nmax_attempts = \"three\"\n").unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_overrides_apply_and_shared_timeout_fans_out() {
        let vars: HashMap<&str, &str> = [
            ("CANDIDATES_MAX_ATTEMPTS", "4"),
            ("CANDIDATES_CALL_TIMEOUT_MS", "1500"),
            ("CANDIDATES_BATCH_RETRIES", "1"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.batch.batch_retries, 1);
        assert_eq!(config.search_policy().call_timeout, Duration::from_millis(1500));
        assert_eq!(config.batch_policy().call_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_unparseable_override_names_the_key() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|k| (k == "CANDIDATES_BATCH_MAX").then(|| "seven".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("CANDIDATES_BATCH_MAX"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.toml");
        std::fs::write(&path, "[batch]\nrequest_count = 12\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.batch.request_count, 12);
    }

    #[test]
    fn test_read_defers_validation_until_overrides_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("candidates.toml");
        std::fs::write(&path, "[batch]\ntarget_min = 9\n").unwrap();

        assert!(matches!(
            EngineConfig::load(&path),
            Err(EngineError::InvalidPolicy(_))
        ));

        let mut config = EngineConfig::read(&path).unwrap();
        config
            .apply_overrides(|k| match k {
                "CANDIDATES_BATCH_MAX" => Some("9".to_string()),
                "CANDIDATES_BATCH_REQUEST" => Some("12".to_string()),
                _ => None,
            })
            .unwrap();
        config.validate().unwrap();
        assert_eq!(config.batch.target_min, 9);
        assert_eq!(config.batch.target_max, 9);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/candidates.toml")).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }
}
