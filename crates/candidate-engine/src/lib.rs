//! Candidate Engine
//!
//! Orchestrates unreliable generators and verifiers into three request
//! shapes:
//!
//! - [`request_single_verified_candidate`]: bounded generate -> verify retries
//! - [`request_verified_batch`]: one oversized batch, verified until `target_max`
//! - [`request_deduped_search`]: query expansion, concurrent lookups, merge by key
//!
//! Generators, verifiers, expanders and lookups are traits; concrete HTTP
//! implementations live in `candidate-adapters`.

pub mod aggregator;
pub mod config;
pub mod domain;
pub mod engine;
pub mod fakes;
pub mod generator;
pub mod obs;
pub mod retry;
pub mod search;
pub mod telemetry;
pub mod usage;
pub mod verifier;

pub use aggregator::{request_verified_batch, BatchPolicy};
pub use config::{BatchConfig, EngineConfig, RetryConfig, SearchConfig};
pub use domain::{
    AttemptState, BatchOutcome, BatchWarning, DedupKey, EngineError, Keyed, Result, ResultSet,
    VerificationVerdict, VerifiedCandidate,
};
pub use engine::CandidateEngine;
pub use generator::{BatchGenerator, Generator};
pub use retry::{
    request_single_verified_candidate, AttemptOutcome, AttemptRecord, RetryController, RetryLog,
    RetryPolicy, RetryState,
};
pub use search::{
    normalize_queries, request_deduped_search, DedupMerge, Lookup, QueryExpander, SearchPolicy,
};
pub use telemetry::init_tracing;
pub use usage::{NoopUsage, RequestKind, UsageCounters, UsageEvent, UsageRecorder, UsageSnapshot};
pub use verifier::{Verifier, VerifierFailurePolicy};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
