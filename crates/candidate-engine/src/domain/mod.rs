//! Domain models for the candidate engine.
//!
//! - `VerificationVerdict`: one verifier decision
//! - `AttemptState`: bounded attempt bookkeeping for one request
//! - `ResultSet` / `BatchOutcome`: aggregated batch results
//! - `DedupKey` / `Keyed`: identity for merging search results

pub mod candidate;
pub mod error;

pub use candidate::{
    AttemptState, BatchOutcome, BatchWarning, DedupKey, Keyed, ResultSet, VerificationVerdict,
    VerifiedCandidate,
};
pub use error::{EngineError, Result};
