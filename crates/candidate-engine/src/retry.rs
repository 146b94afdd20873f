//! Bounded generate -> verify retry controller.
//!
//! This module provides:
//! - the retry state machine
//!   (`Idle -> Generating -> Verifying -> {Accepted | RetryPending | Exhausted}`)
//! - a bounded attempt loop with no backoff
//! - an auditable per-attempt log
//!
//! Attempts are strictly sequential: attempt N+1 starts only after attempt
//! N's verdict is known.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::domain::{AttemptState, EngineError, Result, VerifiedCandidate};
use crate::generator::{generate_bounded, Generator};
use crate::obs;
use crate::verifier::{verify_bounded, Verifier, VerifierFailurePolicy};

/// States of the retry controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryState {
    Idle,
    Generating,
    Verifying,
    Accepted,
    RetryPending,
    Exhausted,
}

impl RetryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RetryState::Accepted | RetryState::Exhausted)
    }
}

/// How a single attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Rejected,
    Absent,
    GeneratorUnavailable,
}

/// Bounded retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Bound applied to every generator and verifier call.
    pub call_timeout: Duration,
    pub on_verifier_error: VerifierFailurePolicy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: Duration::from_secs(30),
            on_verifier_error: VerifierFailurePolicy::FailClosed,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    pub fn fail_open(mut self) -> Self {
        self.on_verifier_error = VerifierFailurePolicy::FailOpen;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(EngineError::InvalidPolicy(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(EngineError::InvalidPolicy(
                "call_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// One auditable attempt in the retry timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    /// States entered during this attempt, in order.
    pub transitions: Vec<RetryState>,
    pub outcome: AttemptOutcome,
    /// Verifier reasoning or transport error text. Diagnostic only.
    pub detail: Option<String>,
}

impl AttemptRecord {
    fn start(attempt: u32) -> Self {
        Self {
            attempt,
            transitions: vec![RetryState::Generating],
            outcome: AttemptOutcome::Absent,
            detail: None,
        }
    }

    fn finish(mut self, outcome: AttemptOutcome, detail: Option<String>) -> Self {
        let next = if outcome == AttemptOutcome::Accepted {
            RetryState::Accepted
        } else {
            RetryState::RetryPending
        };
        self.transitions.push(next);
        self.outcome = outcome;
        self.detail = detail;
        self
    }
}

/// Full retry log for one logical request.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryLog<C> {
    pub max_attempts: u32,
    pub attempts_used: u32,
    pub attempts: Vec<AttemptRecord>,
    pub final_state: RetryState,
    pub accepted: Option<VerifiedCandidate<C>>,
}

impl<C> RetryLog<C> {
    /// Collapse the log into the caller-facing result.
    pub fn into_result(self) -> Result<VerifiedCandidate<C>> {
        match self.accepted {
            Some(accepted) => Ok(accepted),
            None => Err(EngineError::NoValidCandidate {
                attempts: self.attempts_used,
            }),
        }
    }
}

/// Drives bounded generate -> verify attempts for a single request.
#[derive(Debug, Clone, Copy)]
pub struct RetryController {
    policy: RetryPolicy,
}

impl RetryController {
    /// Build a controller. Rejects policies that could never accept.
    pub fn new(policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the attempt loop to a terminal state and return the full log.
    pub async fn run<R, C, K, G, V>(
        &self,
        generator: &G,
        verifier: &V,
        request: &R,
        criteria: &K,
    ) -> RetryLog<C>
    where
        R: Sync,
        C: Send + Sync,
        K: Sync,
        G: Generator<R, C> + ?Sized,
        V: Verifier<C, K> + ?Sized,
    {
        let policy = self.policy;
        let mut state: AttemptState<VerifiedCandidate<C>> = AttemptState::new(policy.max_attempts);
        let mut attempts = Vec::new();

        // Idle -> Generating, and RetryPending -> Generating while budget remains.
        while state.begin_attempt() {
            let attempt = state.attempts_made();
            obs::emit_attempt_started(attempt, policy.max_attempts);
            let mut record = AttemptRecord::start(attempt);

            let candidate = match generate_bounded(generator, request, policy.call_timeout).await {
                Ok(Some(candidate)) => candidate,
                Ok(None) => {
                    obs::emit_candidate_absent(attempt);
                    attempts.push(record.finish(AttemptOutcome::Absent, None));
                    continue;
                }
                Err(err) => {
                    obs::emit_generator_unavailable(attempt, &err);
                    attempts.push(
                        record.finish(AttemptOutcome::GeneratorUnavailable, Some(err.to_string())),
                    );
                    continue;
                }
            };

            record.transitions.push(RetryState::Verifying);
            let verdict = verify_bounded(
                verifier,
                &candidate,
                criteria,
                policy.call_timeout,
                policy.on_verifier_error,
            )
            .await;

            if verdict.is_valid {
                obs::emit_candidate_accepted(attempt);
                attempts.push(
                    record.finish(AttemptOutcome::Accepted, Some(verdict.reasoning.clone())),
                );
                state.accept(VerifiedCandidate {
                    candidate,
                    attempts_made: attempt,
                    reasoning: verdict.reasoning,
                });
            } else {
                obs::emit_candidate_rejected(attempt, &verdict.reasoning);
                attempts.push(record.finish(AttemptOutcome::Rejected, Some(verdict.reasoning)));
            }
        }

        let attempts_used = state.attempts_made();
        let accepted = state.take_accepted();
        let final_state = if accepted.is_some() {
            RetryState::Accepted
        } else {
            obs::emit_request_exhausted(attempts_used);
            RetryState::Exhausted
        };

        RetryLog {
            max_attempts: policy.max_attempts,
            attempts_used,
            attempts,
            final_state,
            accepted,
        }
    }
}

/// Request one verified candidate, retrying up to `policy.max_attempts` times.
///
/// Fails with [`EngineError::NoValidCandidate`] once every attempt is spent,
/// or with [`EngineError::InvalidPolicy`] for an unusable policy.
pub async fn request_single_verified_candidate<R, C, K, G, V>(
    generator: &G,
    verifier: &V,
    request: &R,
    criteria: &K,
    policy: RetryPolicy,
) -> Result<VerifiedCandidate<C>>
where
    R: Sync,
    C: Send + Sync,
    K: Sync,
    G: Generator<R, C> + ?Sized,
    V: Verifier<C, K> + ?Sized,
{
    let controller = RetryController::new(policy)?;
    controller
        .run(generator, verifier, request, criteria)
        .instrument(obs::request_span("single"))
        .await
        .into_result()
}
