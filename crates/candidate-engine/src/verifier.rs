//! Verifier contracts and the policy for unverifiable candidates.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{EngineError, Result, VerificationVerdict};
use crate::generator::timed_out;
use crate::obs;

/// Independent check assigning a verdict to one candidate.
///
/// Verifying the same candidate twice may legitimately disagree; the engine
/// calls the verifier afresh every time and never caches a verdict.
#[async_trait]
pub trait Verifier<C: Sync, K: Sync = ()>: Send + Sync {
    async fn verify(
        &self,
        candidate: &C,
        criteria: &K,
        timeout: Duration,
    ) -> Result<VerificationVerdict>;
}

/// How a [`EngineError::VerifierUnavailable`] is turned into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifierFailurePolicy {
    /// Discard the candidate.
    #[default]
    FailClosed,
    /// Trust the candidate.
    FailOpen,
}

pub const VERIFICATION_FAILED: &str = "verification failed";
pub const VERIFICATION_SKIPPED_OPEN: &str =
    "verification unavailable; accepted under fail-open policy";

impl VerifierFailurePolicy {
    /// Resolve a verifier call into a verdict, absorbing errors per policy.
    pub fn resolve(self, result: Result<VerificationVerdict>) -> VerificationVerdict {
        match result {
            Ok(verdict) => verdict,
            Err(err) => {
                let fail_open = self == VerifierFailurePolicy::FailOpen;
                obs::emit_verifier_unavailable(&err, fail_open);
                if fail_open {
                    VerificationVerdict::valid(VERIFICATION_SKIPPED_OPEN)
                } else {
                    VerificationVerdict::invalid(VERIFICATION_FAILED)
                }
            }
        }
    }
}

/// Call `verify` under an engine-side deadline and resolve it per `policy`.
pub(crate) async fn verify_bounded<C, K, V>(
    verifier: &V,
    candidate: &C,
    criteria: &K,
    timeout: Duration,
    policy: VerifierFailurePolicy,
) -> VerificationVerdict
where
    C: Sync,
    K: Sync,
    V: Verifier<C, K> + ?Sized,
{
    let result = match tokio::time::timeout(timeout, verifier.verify(candidate, criteria, timeout))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(EngineError::verifier(timed_out(timeout))),
    };
    policy.resolve(result)
}
