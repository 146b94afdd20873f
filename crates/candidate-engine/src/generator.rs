//! Generator contracts.
//!
//! A generator wraps one call to a non-deterministic external producer
//! (a model completion, an image endpoint, a search API). Its output is
//! untrusted until a verifier has looked at it.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{EngineError, Result};

/// Produces zero or one candidate per call.
///
/// "Nothing found" is `Ok(None)`, never an error. Transport failures
/// (timeout, malformed response) are [`EngineError::GeneratorUnavailable`].
/// `timeout` is the bound the adapter must apply to its own round trip.
#[async_trait]
pub trait Generator<R: Sync, C: Send>: Send + Sync {
    async fn generate(&self, request: &R, timeout: Duration) -> Result<Option<C>>;
}

/// Produces up to `count` candidates in one external call.
#[async_trait]
pub trait BatchGenerator<R: Sync, C: Send>: Send + Sync {
    async fn generate_batch(&self, request: &R, count: usize, timeout: Duration)
        -> Result<Vec<C>>;
}

pub(crate) fn timed_out(timeout: Duration) -> String {
    format!("timed out after {} ms", timeout.as_millis())
}

/// Call `generate` under an engine-side deadline equal to `timeout`.
pub(crate) async fn generate_bounded<R, C, G>(
    generator: &G,
    request: &R,
    timeout: Duration,
) -> Result<Option<C>>
where
    R: Sync,
    C: Send,
    G: Generator<R, C> + ?Sized,
{
    match tokio::time::timeout(timeout, generator.generate(request, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::generator(timed_out(timeout))),
    }
}

/// Call `generate_batch` under an engine-side deadline equal to `timeout`.
pub(crate) async fn generate_batch_bounded<R, C, G>(
    generator: &G,
    request: &R,
    count: usize,
    timeout: Duration,
) -> Result<Vec<C>>
where
    R: Sync,
    C: Send,
    G: BatchGenerator<R, C> + ?Sized,
{
    match tokio::time::timeout(timeout, generator.generate_batch(request, count, timeout)).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::generator(timed_out(timeout))),
    }
}
