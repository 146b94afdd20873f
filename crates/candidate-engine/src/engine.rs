//! Configured entry point bundling the three request operations.
//!
//! [`CandidateEngine`] owns an [`EngineConfig`] and a [`UsageRecorder`].
//! Usage is recorded only after a request completes successfully: an
//! accepted single candidate, a non-empty batch, or a non-empty search.

use std::sync::Arc;

use crate::aggregator::request_verified_batch;
use crate::config::EngineConfig;
use crate::domain::{BatchOutcome, Keyed, Result, VerifiedCandidate};
use crate::generator::{BatchGenerator, Generator};
use crate::retry::{request_single_verified_candidate, RetryPolicy};
use crate::search::{request_deduped_search, Lookup, QueryExpander, SearchPolicy};
use crate::usage::{NoopUsage, RequestKind, UsageEvent, UsageRecorder};
use crate::verifier::Verifier;

#[derive(Clone)]
pub struct CandidateEngine {
    config: EngineConfig,
    usage: Arc<dyn UsageRecorder>,
}

impl std::fmt::Debug for CandidateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CandidateEngine {
    /// Build an engine, rejecting inconsistent policies up front.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            usage: Arc::new(NoopUsage),
        })
    }

    pub fn with_usage(mut self, usage: Arc<dyn UsageRecorder>) -> Self {
        self.usage = usage;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Single verified candidate under the configured retry policy.
    pub async fn single<R, C, K, G, V>(
        &self,
        generator: &G,
        verifier: &V,
        request: &R,
        criteria: &K,
    ) -> Result<VerifiedCandidate<C>>
    where
        R: Sync,
        C: Send + Sync,
        K: Sync,
        G: Generator<R, C> + ?Sized,
        V: Verifier<C, K> + ?Sized,
    {
        self.single_with_policy(generator, verifier, request, criteria, self.config.retry_policy())
            .await
    }

    /// Single verified candidate under an explicit policy, e.g. a fail-open
    /// variant for a judge whose outages should not block the caller.
    pub async fn single_with_policy<R, C, K, G, V>(
        &self,
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
        let accepted =
            request_single_verified_candidate(generator, verifier, request, criteria, policy)
                .await?;
        self.usage.record(&UsageEvent::new(
            RequestKind::Single,
            1,
            accepted.attempts_made,
        ));
        Ok(accepted)
    }

    pub async fn batch<R, C, K, G, V>(
        &self,
        generator: &G,
        verifier: &V,
        request: &R,
        criteria: &K,
    ) -> BatchOutcome<C>
    where
        R: Sync,
        C: PartialEq + Send + Sync,
        K: Sync,
        G: BatchGenerator<R, C> + ?Sized,
        V: Verifier<C, K> + ?Sized,
    {
        let outcome = request_verified_batch(
            generator,
            verifier,
            request,
            criteria,
            &self.config.batch_policy(),
        )
        .await;
        if !outcome.candidates.is_empty() {
            self.usage.record(&UsageEvent::new(
                RequestKind::Batch,
                outcome.candidates.len(),
                outcome.generator_calls,
            ));
        }
        outcome
    }

    pub async fn search<C, E, L>(&self, expander: &E, lookup: &L, raw_query: &str) -> Vec<C>
    where
        C: Keyed + Send,
        E: QueryExpander + ?Sized,
        L: Lookup<C> + ?Sized,
    {
        self.search_with_policy(expander, lookup, raw_query, &self.config.search_policy())
            .await
    }

    /// Search with an explicit policy, e.g. a per-call category allow-list.
    pub async fn search_with_policy<C, E, L>(
        &self,
        expander: &E,
        lookup: &L,
        raw_query: &str,
        policy: &SearchPolicy,
    ) -> Vec<C>
    where
        C: Keyed + Send,
        E: QueryExpander + ?Sized,
        L: Lookup<C> + ?Sized,
    {
        let results = request_deduped_search(expander, lookup, raw_query, policy).await;
        if !results.is_empty() {
            self.usage
                .record(&UsageEvent::new(RequestKind::Search, results.len(), 0));
        }
        results
    }
}
