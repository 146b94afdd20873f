//! Structured diagnostic events for generate/verify orchestration.
//!
//! This module provides:
//! - Request-scoped tracing spans via `request_span`
//! - Emission functions for every decision the engine takes
//!
//! Rejection reasons and transport failures are diagnostics. They are never
//! part of a caller-facing error. Every event carries an `event` field so
//! JSON log pipelines can filter on it.

use tracing::{debug, info, warn};

/// Build a request-scoped span tagged with a fresh `request_id` and `op`.
///
/// Attach it with `tracing::Instrument` so the future stays `Send`.
///
/// # Example
///
/// ```ignore
/// controller.run(&g, &v, &req, &criteria).instrument(request_span("single")).await;
/// ```
pub fn request_span(op: &str) -> tracing::Span {
    let request_id = uuid::Uuid::new_v4();
    tracing::info_span!("candidates.request", request_id = %request_id, op = %op)
}

pub fn emit_attempt_started(attempt: u32, max_attempts: u32) {
    debug!(event = "attempt.started", attempt = attempt, max_attempts = max_attempts);
}

/// Generator returned no candidate; the attempt is spent without verification.
pub fn emit_candidate_absent(attempt: u32) {
    info!(event = "candidate.absent", attempt = attempt);
}

pub fn emit_candidate_rejected(attempt: u32, reasoning: &str) {
    info!(event = "candidate.rejected", attempt = attempt, reasoning = %reasoning);
}

pub fn emit_generator_unavailable(attempt: u32, error: &dyn std::fmt::Display) {
    warn!(event = "generator.unavailable", attempt = attempt, error = %error);
}

/// Verifier failed; `fail_open` records which policy resolved the verdict.
pub fn emit_verifier_unavailable(error: &dyn std::fmt::Display, fail_open: bool) {
    warn!(event = "verifier.unavailable", error = %error, fail_open = fail_open);
}

pub fn emit_candidate_accepted(attempt: u32) {
    info!(event = "candidate.accepted", attempt = attempt);
}

pub fn emit_request_exhausted(attempts: u32) {
    warn!(event = "request.exhausted", attempts = attempts);
}

pub fn emit_batch_generated(round: u32, requested: usize, received: usize) {
    info!(
        event = "batch.generated",
        round = round,
        requested = requested,
        received = received,
    );
}

pub fn emit_batch_candidate_rejected(round: u32, position: usize, reasoning: &str) {
    info!(
        event = "candidate.rejected",
        round = round,
        position = position,
        reasoning = %reasoning,
    );
}

/// Batch finished with fewer verified candidates than the minimum.
pub fn emit_batch_below_minimum(collected: usize, target_min: usize) {
    warn!(
        event = "batch.below_minimum",
        collected = collected,
        target_min = target_min,
    );
}

pub fn emit_batch_completed(accepted: usize, verifications: usize, generator_calls: u32) {
    info!(
        event = "batch.completed",
        accepted = accepted,
        verifications = verifications,
        generator_calls = generator_calls,
    );
}

pub fn emit_expansion_fallback(error: &dyn std::fmt::Display) {
    warn!(event = "search.expansion_fallback", error = %error);
}

pub fn emit_branch_failed(query: &str, error: &dyn std::fmt::Display) {
    warn!(event = "search.branch_failed", query = %query, error = %error);
}

pub fn emit_search_completed(queries: usize, merged: usize, dropped_by_category: usize) {
    info!(
        event = "search.completed",
        queries = queries,
        merged = merged,
        dropped_by_category = dropped_by_category,
    );
}
