//! Per-request entities: verdicts, attempt bookkeeping, result sets, dedup keys.
//!
//! Everything here lives for exactly one logical request. Nothing is cached
//! or shared across requests.

use serde::{Deserialize, Serialize};

/// Verdict produced by a verifier for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationVerdict {
    pub is_valid: bool,
    pub reasoning: String,
}

impl VerificationVerdict {
    pub fn valid(reasoning: impl Into<String>) -> Self {
        Self {
            is_valid: true,
            reasoning: reasoning.into(),
        }
    }

    pub fn invalid(reasoning: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reasoning: reasoning.into(),
        }
    }
}

/// A candidate that passed verification, with the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedCandidate<C> {
    pub candidate: C,
    /// 1-based count of attempts consumed, including the accepting one.
    pub attempts_made: u32,
    /// Reasoning attached to the accepting verdict.
    pub reasoning: String,
}

/// Attempt bookkeeping for a single logical request.
///
/// Invariants: `attempts_made <= max_attempts`, and once `accepted` is set
/// [`AttemptState::begin_attempt`] refuses to start another attempt.
#[derive(Debug, Clone)]
pub struct AttemptState<C> {
    attempts_made: u32,
    max_attempts: u32,
    accepted: Option<C>,
}

impl<C> AttemptState<C> {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts_made: 0,
            max_attempts,
            accepted: None,
        }
    }

    /// Consume one attempt. Returns `false` when the budget is spent or a
    /// candidate has already been accepted.
    pub fn begin_attempt(&mut self) -> bool {
        if self.accepted.is_some() || self.attempts_made >= self.max_attempts {
            return false;
        }
        self.attempts_made += 1;
        true
    }

    pub fn accept(&mut self, candidate: C) {
        self.accepted = Some(candidate);
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted.is_some()
    }

    pub fn can_retry(&self) -> bool {
        self.accepted.is_none() && self.attempts_made < self.max_attempts
    }

    pub fn take_accepted(&mut self) -> Option<C> {
        self.accepted.take()
    }
}

/// Ordered collection of verified candidates bounded by `target_max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet<C> {
    pub candidates: Vec<C>,
    pub target_min: usize,
    pub target_max: usize,
}

impl<C> ResultSet<C> {
    pub fn new(target_min: usize, target_max: usize) -> Self {
        Self {
            candidates: Vec::with_capacity(target_max),
            target_min,
            target_max,
        }
    }

    /// Append a verified candidate. Returns `false` (and drops it) when full.
    pub fn push(&mut self, candidate: C) -> bool {
        if self.is_full() {
            return false;
        }
        self.candidates.push(candidate);
        true
    }

    pub fn is_full(&self) -> bool {
        self.candidates.len() >= self.target_max
    }

    pub fn is_below_minimum(&self) -> bool {
        self.candidates.len() < self.target_min
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Warning attached to an otherwise successful batch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BatchWarning {
    BelowMinimum { collected: usize, target_min: usize },
}

/// Result of a verified batch request. Never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome<C> {
    pub candidates: Vec<C>,
    pub warning: Option<BatchWarning>,
    /// Number of batch generator invocations made.
    pub generator_calls: u32,
    /// Number of verifier invocations made.
    pub verifications: usize,
}

impl<C> BatchOutcome<C> {
    pub fn is_below_minimum(&self) -> bool {
        matches!(self.warning, Some(BatchWarning::BelowMinimum { .. }))
    }
}

/// Identity used to merge duplicate candidates from parallel branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(pub String);

impl DedupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DedupKey {
    fn from(value: &str) -> Self {
        DedupKey(value.to_string())
    }
}

impl From<String> for DedupKey {
    fn from(value: String) -> Self {
        DedupKey(value)
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Candidates that carry a natural identity and, optionally, a category tag.
pub trait Keyed {
    fn dedup_key(&self) -> DedupKey;

    /// Category tag checked against a search allow-list. `None` never matches
    /// a non-empty allow-list.
    fn category(&self) -> Option<&str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_state_caps_attempts() {
        let mut state: AttemptState<()> = AttemptState::new(3);
        assert!(state.begin_attempt());
        assert!(state.begin_attempt());
        assert!(state.begin_attempt());
        assert!(!state.begin_attempt());
        assert_eq!(state.attempts_made(), 3);
        assert!(!state.can_retry());
    }

    #[test]
    fn test_attempt_state_stops_after_accept() {
        let mut state = AttemptState::new(3);
        assert!(state.begin_attempt());
        state.accept("first");
        assert!(!state.begin_attempt());
        assert!(!state.can_retry());
        assert_eq!(state.attempts_made(), 1);
        assert_eq!(state.take_accepted(), Some("first"));
    }

    #[test]
    fn test_result_set_rejects_past_max() {
        let mut set = ResultSet::new(1, 2);
        assert!(set.is_below_minimum());
        assert!(set.push(1));
        assert!(!set.is_below_minimum());
        assert!(set.push(2));
        assert!(set.is_full());
        assert!(!set.push(3));
        assert_eq!(set.candidates, vec![1, 2]);
    }

    #[test]
    fn test_batch_warning_serializes_with_kind_tag() {
        let warning = BatchWarning::BelowMinimum {
            collected: 2,
            target_min: 5,
        };
        let json = serde_json::to_value(warning).unwrap();
        assert_eq!(json["kind"], "below_minimum");
        assert_eq!(json["collected"], 2);
    }
}
