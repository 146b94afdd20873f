//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides scripted generators, verifiers, expanders and lookups that
//! satisfy the trait contracts without any network access. Every fake counts
//! its calls so tests can assert on bounds and short-circuits.

use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{DedupKey, EngineError, Keyed, Result, VerificationVerdict};
use crate::generator::{BatchGenerator, Generator};
use crate::search::{Lookup, QueryExpander};
use crate::verifier::Verifier;

// ---------------------------------------------------------------------------
// ScriptedGenerator
// ---------------------------------------------------------------------------

/// One scripted generator response.
#[derive(Debug, Clone)]
pub enum GenStep<C> {
    Candidate(C),
    Absent,
    Unavailable(String),
    /// Never resolves; only the engine-side timeout ends the call.
    Hang,
}

/// Generator replaying a script, then falling back to `after_script`.
#[derive(Debug)]
pub struct ScriptedGenerator<C> {
    script: Mutex<VecDeque<GenStep<C>>>,
    after_script: GenStep<C>,
    calls: AtomicUsize,
}

impl<C: Clone> ScriptedGenerator<C> {
    /// Replay `steps`, then return `Ok(None)` forever.
    pub fn new(steps: Vec<GenStep<C>>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            after_script: GenStep::Absent,
            calls: AtomicUsize::new(0),
        }
    }

    /// Return the same candidate on every call.
    pub fn repeating(candidate: C) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            after_script: GenStep::Candidate(candidate),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> GenStep<C> {
        let mut script = self.script.lock().unwrap();
        script
            .pop_front()
            .unwrap_or_else(|| self.after_script.clone())
    }
}

#[async_trait]
impl<R, C> Generator<R, C> for ScriptedGenerator<C>
where
    R: Sync,
    C: Clone + Send + Sync,
{
    async fn generate(&self, _request: &R, _timeout: Duration) -> Result<Option<C>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.next_step() {
            GenStep::Candidate(c) => Ok(Some(c)),
            GenStep::Absent => Ok(None),
            GenStep::Unavailable(reason) => Err(EngineError::generator(reason)),
            GenStep::Hang => {
                std::future::pending::<()>().await;
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// FixedBatchGenerator
// ---------------------------------------------------------------------------

/// Batch generator returning pre-built batches in order, then empty batches.
///
/// Each batch is truncated to the requested `count`.
#[derive(Debug)]
pub struct FixedBatchGenerator<C> {
    batches: Mutex<VecDeque<std::result::Result<Vec<C>, String>>>,
    requested: Mutex<Vec<usize>>,
    calls: AtomicUsize,
    hang: bool,
}

impl<C> FixedBatchGenerator<C> {
    pub fn new(batches: Vec<std::result::Result<Vec<C>, String>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            requested: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            hang: false,
        }
    }

    /// A generator whose calls never resolve.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::new(Vec::new())
        }
    }

    /// A generator that yields a single batch.
    pub fn single(batch: Vec<C>) -> Self {
        Self::new(vec![Ok(batch)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The `count` argument of every call, in order.
    pub fn requested_counts(&self) -> Vec<usize> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl<R, C> BatchGenerator<R, C> for FixedBatchGenerator<C>
where
    R: Sync,
    C: Send + Sync,
{
    async fn generate_batch(
        &self,
        _request: &R,
        count: usize,
        _timeout: Duration,
    ) -> Result<Vec<C>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(count);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(Ok(mut batch)) => {
                batch.truncate(count);
                Ok(batch)
            }
            Some(Err(reason)) => Err(EngineError::generator(reason)),
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Verifiers
// ---------------------------------------------------------------------------

/// Verifier returning the same verdict for every candidate.
#[derive(Debug)]
pub struct ConstVerifier {
    verdict: VerificationVerdict,
    calls: AtomicUsize,
    hang: bool,
}

impl ConstVerifier {
    pub fn valid() -> Self {
        Self {
            verdict: VerificationVerdict::valid("ok"),
            calls: AtomicUsize::new(0),
            hang: false,
        }
    }

    pub fn invalid(reasoning: &str) -> Self {
        Self {
            verdict: VerificationVerdict::invalid(reasoning),
            calls: AtomicUsize::new(0),
            hang: false,
        }
    }

    /// A verifier whose calls never resolve.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::valid()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C: Sync, K: Sync> Verifier<C, K> for ConstVerifier {
    async fn verify(
        &self,
        _candidate: &C,
        _criteria: &K,
        _timeout: Duration,
    ) -> Result<VerificationVerdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        Ok(self.verdict.clone())
    }
}

/// Verifier driven by a closure receiving the candidate and a 0-based call index.
pub struct FnVerifier<C, F> {
    f: F,
    calls: AtomicUsize,
    _candidate: PhantomData<fn(&C)>,
}

impl<C, F> FnVerifier<C, F>
where
    F: Fn(&C, usize) -> Result<VerificationVerdict> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            calls: AtomicUsize::new(0),
            _candidate: PhantomData,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<C, K, F> Verifier<C, K> for FnVerifier<C, F>
where
    C: Sync,
    K: Sync,
    F: Fn(&C, usize) -> Result<VerificationVerdict> + Send + Sync,
{
    async fn verify(
        &self,
        candidate: &C,
        _criteria: &K,
        _timeout: Duration,
    ) -> Result<VerificationVerdict> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.f)(candidate, index)
    }
}

// ---------------------------------------------------------------------------
// Search fakes
// ---------------------------------------------------------------------------

/// Expander returning a fixed list, or failing.
#[derive(Debug)]
pub struct StaticExpander {
    response: std::result::Result<Vec<String>, String>,
    calls: AtomicUsize,
    hang: bool,
}

impl StaticExpander {
    pub fn queries(queries: &[&str]) -> Self {
        Self {
            response: Ok(queries.iter().map(|q| q.to_string()).collect()),
            calls: AtomicUsize::new(0),
            hang: false,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            calls: AtomicUsize::new(0),
            hang: false,
        }
    }

    /// An expander whose calls never resolve.
    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::queries(&[])
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExpander for StaticExpander {
    async fn expand(&self, _raw_query: &str, _timeout: Duration) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.response.clone().map_err(EngineError::generator)
    }
}

/// Listing used by search tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeListing {
    pub id: String,
    pub category: Option<String>,
    pub label: String,
}

impl FakeListing {
    pub fn new(id: &str, category: &str, label: &str) -> Self {
        Self {
            id: id.to_string(),
            category: Some(category.to_string()),
            label: label.to_string(),
        }
    }
}

impl Keyed for FakeListing {
    fn dedup_key(&self) -> DedupKey {
        DedupKey::from(self.id.as_str())
    }

    fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }
}

#[derive(Debug, Clone)]
struct LookupEntry<C> {
    response: std::result::Result<Vec<C>, String>,
    delay: Duration,
}

/// Lookup answering from a per-query table. Unknown queries return no results.
#[derive(Debug)]
pub struct MapLookup<C> {
    entries: HashMap<String, LookupEntry<C>>,
    seen: Mutex<Vec<String>>,
}

impl<C: Clone> MapLookup<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_results(mut self, query: &str, results: Vec<C>) -> Self {
        self.entries.insert(
            query.to_string(),
            LookupEntry {
                response: Ok(results),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Like [`MapLookup::with_results`] but the branch resolves after `delay`.
    pub fn with_delayed_results(mut self, query: &str, results: Vec<C>, delay: Duration) -> Self {
        self.entries.insert(
            query.to_string(),
            LookupEntry {
                response: Ok(results),
                delay,
            },
        );
        self
    }

    pub fn with_failure(mut self, query: &str, reason: &str) -> Self {
        self.entries.insert(
            query.to_string(),
            LookupEntry {
                response: Err(reason.to_string()),
                delay: Duration::ZERO,
            },
        );
        self
    }

    /// Queries received, in call order.
    pub fn seen_queries(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

impl<C: Clone> Default for MapLookup<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C> Lookup<C> for MapLookup<C>
where
    C: Clone + Send + Sync,
{
    async fn lookup(&self, query: &str, _timeout: Duration) -> Result<Vec<C>> {
        self.seen.lock().unwrap().push(query.to_string());
        let Some(entry) = self.entries.get(query).cloned() else {
            return Ok(Vec::new());
        };
        if !entry.delay.is_zero() {
            tokio::time::sleep(entry.delay).await;
        }
        entry.response.map_err(EngineError::lookup)
    }
}
