//! Query expansion with parallel fan-out and deduplicating merge.
//!
//! One free-text query becomes several higher-precision queries through a
//! single expander call. Every expanded query is looked up concurrently,
//! filtered to a category allow-list, and merged by [`DedupKey`] with the
//! first completed branch winning. Branch failures contribute nothing;
//! expansion failure degrades to the raw query. The operation never fails.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tracing::Instrument;

use crate::domain::{DedupKey, EngineError, Keyed, Result};
use crate::generator::timed_out;
use crate::obs;

/// Turns one raw query into several refined queries.
#[async_trait]
pub trait QueryExpander: Send + Sync {
    async fn expand(&self, raw_query: &str, timeout: Duration) -> Result<Vec<String>>;
}

/// External lookup API answering one query.
#[async_trait]
pub trait Lookup<C: Send>: Send + Sync {
    async fn lookup(&self, query: &str, timeout: Duration) -> Result<Vec<C>>;
}

/// Fan-out search policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPolicy {
    /// Cap on queries issued, including the raw query when kept.
    pub max_queries: usize,
    /// Always issue the raw query alongside the expansions.
    pub include_original: bool,
    /// Accepted category tags. Empty accepts everything.
    pub allowed_categories: Vec<String>,
    pub call_timeout: Duration,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            max_queries: 5,
            include_original: true,
            allowed_categories: Vec::new(),
            call_timeout: Duration::from_secs(10),
        }
    }
}

impl SearchPolicy {
    pub fn with_allowed_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_queries == 0 {
            return Err(EngineError::InvalidPolicy(
                "max_queries must be at least 1".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(EngineError::InvalidPolicy(
                "call_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a candidate's category passes the allow-list.
    pub fn allows<C: Keyed>(&self, candidate: &C) -> bool {
        if self.allowed_categories.is_empty() {
            return true;
        }
        match candidate.category() {
            Some(category) => self
                .allowed_categories
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(category)),
            None => false,
        }
    }
}

/// Build the final query list: trimmed, case-insensitively unique, capped.
pub fn normalize_queries(
    raw_query: &str,
    expanded: Vec<String>,
    policy: &SearchPolicy,
) -> Vec<String> {
    let cap = policy.max_queries.max(1);
    let raw = raw_query.trim();
    let mut seen = HashSet::new();
    let mut queries = Vec::with_capacity(cap);

    let originals = policy.include_original.then(|| raw.to_string());
    for query in originals.into_iter().chain(expanded) {
        let query = query.trim();
        if query.is_empty() || !seen.insert(query.to_lowercase()) {
            continue;
        }
        queries.push(query.to_string());
        if queries.len() == cap {
            break;
        }
    }

    if queries.is_empty() {
        queries.push(raw.to_string());
    }
    queries
}

/// First-wins merge keyed by [`DedupKey`], preserving arrival order.
#[derive(Debug)]
pub struct DedupMerge<C> {
    seen: HashSet<DedupKey>,
    merged: Vec<C>,
}

impl<C: Keyed> DedupMerge<C> {
    pub fn new() -> Self {
        Self {
            seen: HashSet::new(),
            merged: Vec::new(),
        }
    }

    /// Insert unless the key is already present. Returns whether it was kept.
    pub fn insert(&mut self, candidate: C) -> bool {
        if self.seen.insert(candidate.dedup_key()) {
            self.merged.push(candidate);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.merged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.merged.is_empty()
    }

    pub fn into_vec(self) -> Vec<C> {
        self.merged
    }
}

impl<C: Keyed> Default for DedupMerge<C> {
    fn default() -> Self {
        Self::new()
    }
}

async fn expand_or_fallback<E>(expander: &E, raw_query: &str, policy: &SearchPolicy) -> Vec<String>
where
    E: QueryExpander + ?Sized,
{
    let timeout = policy.call_timeout;
    let expanded = match tokio::time::timeout(timeout, expander.expand(raw_query, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::generator(timed_out(timeout))),
    };

    match expanded {
        Ok(queries) if queries.iter().any(|q| !q.trim().is_empty()) => {
            normalize_queries(raw_query, queries, policy)
        }
        Ok(_) => {
            obs::emit_expansion_fallback(&"expansion returned no queries");
            vec![raw_query.trim().to_string()]
        }
        Err(err) => {
            obs::emit_expansion_fallback(&err);
            vec![raw_query.trim().to_string()]
        }
    }
}

async fn lookup_bounded<C, L>(lookup: &L, query: &str, timeout: Duration) -> Result<Vec<C>>
where
    C: Send,
    L: Lookup<C> + ?Sized,
{
    match tokio::time::timeout(timeout, lookup.lookup(query, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::lookup(timed_out(timeout))),
    }
}

/// Expand, fan out, filter and merge. Never fails.
///
/// Returns an empty list for a blank query, when nothing matches, or when
/// every branch errors. Result order follows branch completion and must not
/// be relied upon.
pub async fn request_deduped_search<C, E, L>(
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
    async move {
        if raw_query.trim().is_empty() {
            return Vec::new();
        }

        let queries = expand_or_fallback(expander, raw_query, policy).await;
        let timeout = policy.call_timeout;

        let mut branches: FuturesUnordered<_> = queries
            .iter()
            .map(|query| async move { (query, lookup_bounded(lookup, query, timeout).await) })
            .collect();

        let mut merge = DedupMerge::new();
        let mut dropped_by_category = 0usize;
        while let Some((query, result)) = branches.next().await {
            match result {
                Ok(entries) => {
                    for entry in entries {
                        if policy.allows(&entry) {
                            merge.insert(entry);
                        } else {
                            dropped_by_category += 1;
                        }
                    }
                }
                Err(err) => obs::emit_branch_failed(query, &err),
            }
        }

        obs::emit_search_completed(queries.len(), merge.len(), dropped_by_category);
        merge.into_vec()
    }
    .instrument(obs::request_span("search"))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FakeListing, MapLookup, StaticExpander};

    fn ids(results: &[FakeListing]) -> Vec<&str> {
        let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_normalize_keeps_original_dedups_and_caps() {
        let policy = SearchPolicy {
            max_queries: 3,
            ..SearchPolicy::default()
        };
        let queries = normalize_queries(
            " tutoring center ",
            vec![
                "Tutoring Center".to_string(),
                "  ".to_string(),
                "campus tutoring".to_string(),
                "math help desk".to_string(),
                "writing lab".to_string(),
            ],
            &policy,
        );
        assert_eq!(
            queries,
            vec!["tutoring center", "campus tutoring", "math help desk"]
        );
    }

    #[test]
    fn test_normalize_without_original() {
        let policy = SearchPolicy {
            include_original: false,
            ..SearchPolicy::default()
        };
        let queries = normalize_queries("library", vec!["main library".to_string()], &policy);
        assert_eq!(queries, vec!["main library"]);
    }

    #[test]
    fn test_allow_list_matching() {
        let policy = SearchPolicy::default().with_allowed_categories(["amenity"]);
        assert!(policy.allows(&FakeListing::new("1", "Amenity", "library")));
        assert!(!policy.allows(&FakeListing::new("2", "highway", "bus stop")));
        let untagged = FakeListing {
            id: "3".into(),
            category: None,
            label: "x".into(),
        };
        assert!(!policy.allows(&untagged));
        assert!(SearchPolicy::default().allows(&untagged));
    }

    #[tokio::test]
    async fn test_duplicate_key_across_branches_appears_once() {
        let expander = StaticExpander::queries(&["campus library", "university library"]);
        let lookup = MapLookup::new()
            .with_results(
                "campus library",
                vec![
                    FakeListing::new("p1", "amenity", "Main Library"),
                    FakeListing::new("p2", "amenity", "Law Library"),
                ],
            )
            .with_results(
                "university library",
                vec![FakeListing::new("p1", "amenity", "Main Library (dup)")],
            );

        let results =
            request_deduped_search(&expander, &lookup, "library", &SearchPolicy::default()).await;

        assert_eq!(ids(&results), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_expansion_failure_falls_back_to_raw_query() {
        let expander = StaticExpander::failing("model unavailable");
        let lookup = MapLookup::new()
            .with_results("study rooms", vec![FakeListing::new("r1", "amenity", "Room")]);

        let results =
            request_deduped_search(&expander, &lookup, "study rooms", &SearchPolicy::default())
                .await;

        assert_eq!(lookup.seen_queries(), vec!["study rooms"]);
        assert_eq!(ids(&results), vec!["r1"]);
    }

    #[tokio::test]
    async fn test_empty_expansion_falls_back_to_raw_query() {
        let expander = StaticExpander::queries(&[]);
        let lookup: MapLookup<FakeListing> = MapLookup::new();

        let results =
            request_deduped_search(&expander, &lookup, "gym", &SearchPolicy::default()).await;

        assert!(results.is_empty());
        assert_eq!(lookup.seen_queries(), vec!["gym"]);
    }

    #[tokio::test]
    async fn test_failing_branch_contributes_nothing() {
        let expander = StaticExpander::queries(&["a", "b"]);
        let lookup = MapLookup::new()
            .with_failure("a", "HTTP 503")
            .with_results("b", vec![FakeListing::new("b1", "amenity", "B")]);

        let results =
            request_deduped_search(&expander, &lookup, "q", &SearchPolicy::default()).await;

        assert_eq!(ids(&results), vec!["b1"]);
    }

    #[tokio::test]
    async fn test_all_branches_failing_yields_empty() {
        let expander = StaticExpander::queries(&["a"]);
        let lookup: MapLookup<FakeListing> = MapLookup::new()
            .with_failure("a", "dns")
            .with_failure("q", "dns");

        let results =
            request_deduped_search(&expander, &lookup, "q", &SearchPolicy::default()).await;

        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_category_filter_drops_disallowed_entries() {
        let expander = StaticExpander::queries(&["coffee"]);
        let lookup = MapLookup::new().with_results(
            "coffee",
            vec![
                FakeListing::new("c1", "amenity", "Cafe"),
                FakeListing::new("c2", "highway", "Coffee Road"),
            ],
        );
        let policy = SearchPolicy::default().with_allowed_categories(["amenity"]);

        let results = request_deduped_search(&expander, &lookup, "cafe", &policy).await;

        assert_eq!(ids(&results), vec!["c1"]);
    }

    #[tokio::test]
    async fn test_blank_query_short_circuits() {
        let expander = StaticExpander::queries(&["x"]);
        let lookup: MapLookup<FakeListing> = MapLookup::new();

        let results =
            request_deduped_search(&expander, &lookup, "   ", &SearchPolicy::default()).await;

        assert!(results.is_empty());
        assert_eq!(expander.calls(), 0);
        assert!(lookup.seen_queries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_completed_branch_wins_duplicate() {
        let expander = StaticExpander::queries(&["slow", "fast"]);
        let lookup = MapLookup::new()
            .with_delayed_results(
                "slow",
                vec![FakeListing::new("k", "amenity", "from slow")],
                Duration::from_millis(200),
            )
            .with_delayed_results(
                "fast",
                vec![FakeListing::new("k", "amenity", "from fast")],
                Duration::from_millis(10),
            );
        let policy = SearchPolicy {
            include_original: false,
            ..SearchPolicy::default()
        };

        let results = request_deduped_search(&expander, &lookup, "q", &policy).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].label, "from fast");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_branch_is_bounded_by_call_timeout() {
        let expander = StaticExpander::queries(&["hung", "quick"]);
        let lookup = MapLookup::new()
            .with_delayed_results(
                "hung",
                vec![FakeListing::new("h", "amenity", "never")],
                Duration::from_secs(3600),
            )
            .with_results("quick", vec![FakeListing::new("q", "amenity", "ok")]);
        let policy = SearchPolicy {
            include_original: false,
            call_timeout: Duration::from_millis(100),
            ..SearchPolicy::default()
        };

        let results = request_deduped_search(&expander, &lookup, "q", &policy).await;

        assert_eq!(ids(&results), vec!["q"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_expander_falls_back_to_raw_query() {
        let expander = StaticExpander::hanging();
        let lookup = MapLookup::new().with_results(
            "writing center",
            vec![FakeListing::new("w", "office", "Writing Center")],
        );
        let policy = SearchPolicy {
            call_timeout: Duration::from_millis(100),
            ..SearchPolicy::default()
        };

        let results = request_deduped_search(&expander, &lookup, "writing center", &policy).await;

        assert_eq!(expander.calls(), 1);
        assert_eq!(lookup.seen_queries(), vec!["writing center".to_string()]);
        assert_eq!(ids(&results), vec!["w"]);
    }
}
