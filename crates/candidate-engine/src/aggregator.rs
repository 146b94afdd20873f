//! Multi-candidate aggregation over one oversized generated batch.
//!
//! The generator is asked once for more candidates than needed
//! (`request_count >= target_max`), candidates are verified sequentially, and
//! verification stops as soon as `target_max` have been accepted. A short
//! result is returned with a [`BatchWarning`] rather than an error.
//!
//! By default a fully rejected batch is not regenerated. `batch_retries`
//! opts into fresh batches while the result is below `target_min`.

use std::time::Duration;

use tracing::Instrument;

use crate::domain::{BatchOutcome, BatchWarning, EngineError, Result, ResultSet};
use crate::generator::{generate_batch_bounded, BatchGenerator};
use crate::obs;
use crate::verifier::{verify_bounded, Verifier, VerifierFailurePolicy};

/// Batch aggregation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    pub target_min: usize,
    pub target_max: usize,
    /// How many raw candidates to ask the generator for.
    pub request_count: usize,
    /// Extra batches allowed while below `target_min`.
    pub batch_retries: u32,
    pub call_timeout: Duration,
    pub on_verifier_error: VerifierFailurePolicy,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            target_min: 5,
            target_max: 7,
            request_count: 10,
            batch_retries: 0,
            call_timeout: Duration::from_secs(60),
            on_verifier_error: VerifierFailurePolicy::FailClosed,
        }
    }
}

impl BatchPolicy {
    pub fn with_targets(mut self, target_min: usize, target_max: usize) -> Self {
        self.target_min = target_min;
        self.target_max = target_max;
        self
    }

    pub fn with_request_count(mut self, request_count: usize) -> Self {
        self.request_count = request_count;
        self
    }

    pub fn with_batch_retries(mut self, batch_retries: u32) -> Self {
        self.batch_retries = batch_retries;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_max == 0 {
            return Err(EngineError::InvalidPolicy(
                "target_max must be at least 1".to_string(),
            ));
        }
        if self.target_min > self.target_max {
            return Err(EngineError::InvalidPolicy(format!(
                "target_min ({}) exceeds target_max ({})",
                self.target_min, self.target_max
            )));
        }
        if self.request_count < self.target_max {
            return Err(EngineError::InvalidPolicy(format!(
                "request_count ({}) must be at least target_max ({})",
                self.request_count, self.target_max
            )));
        }
        if self.call_timeout.is_zero() {
            return Err(EngineError::InvalidPolicy(
                "call_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Clamp an unvalidated policy into a usable one.
    pub fn normalized(mut self) -> Self {
        self.target_max = self.target_max.max(1);
        self.target_min = self.target_min.min(self.target_max);
        self.request_count = self.request_count.max(self.target_max);
        if self.call_timeout.is_zero() {
            self.call_timeout = BatchPolicy::default().call_timeout;
        }
        self
    }
}

/// Generate, verify and collect up to `target_max` candidates. Never fails.
///
/// Within the first batch every candidate is verified in order, repeats
/// included. Top-up batches skip candidates equal to one already accepted.
pub async fn request_verified_batch<R, C, K, G, V>(
    generator: &G,
    verifier: &V,
    request: &R,
    criteria: &K,
    policy: &BatchPolicy,
) -> BatchOutcome<C>
where
    R: Sync,
    C: PartialEq + Send + Sync,
    K: Sync,
    G: BatchGenerator<R, C> + ?Sized,
    V: Verifier<C, K> + ?Sized,
{
    let policy = policy.normalized();
    async move {
        let mut set = ResultSet::new(policy.target_min, policy.target_max);
        let mut verifications = 0usize;
        let mut generator_calls = 0u32;

        for round in 1..=policy.batch_retries.saturating_add(1) {
            if round > 1 && !set.is_below_minimum() {
                break;
            }
            generator_calls += 1;

            let batch = match generate_batch_bounded(
                generator,
                request,
                policy.request_count,
                policy.call_timeout,
            )
            .await
            {
                Ok(batch) => batch,
                Err(err) => {
                    obs::emit_generator_unavailable(round, &err);
                    continue;
                }
            };
            obs::emit_batch_generated(round, policy.request_count, batch.len());

            for (position, candidate) in batch.into_iter().enumerate() {
                if set.is_full() {
                    break;
                }
                if round > 1 && set.candidates.contains(&candidate) {
                    continue;
                }

                verifications += 1;
                let verdict = verify_bounded(
                    verifier,
                    &candidate,
                    criteria,
                    policy.call_timeout,
                    policy.on_verifier_error,
                )
                .await;

                if verdict.is_valid {
                    set.push(candidate);
                } else {
                    obs::emit_batch_candidate_rejected(round, position, &verdict.reasoning);
                }
            }

            if set.is_full() {
                break;
            }
        }

        let warning = if set.is_below_minimum() {
            obs::emit_batch_below_minimum(set.len(), set.target_min);
            Some(BatchWarning::BelowMinimum {
                collected: set.len(),
                target_min: set.target_min,
            })
        } else {
            None
        };
        obs::emit_batch_completed(set.len(), verifications, generator_calls);

        BatchOutcome {
            candidates: set.candidates,
            warning,
            generator_calls,
            verifications,
        }
    }
    .instrument(obs::request_span("batch"))
    .await
}
