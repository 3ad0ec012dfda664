//! The `worker_pool` module builds the `rayon` thread pool the matching layers run against, and
//! the cooperative-cancellation flag a long-running CLI invocation can use to stop between
//! batches.
use crate::error::{MatchError, MatchResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Lower bound on worker threads, regardless of `available_parallelism()`.
const MIN_WORKERS: usize = 4;
/// Upper bound on worker threads, regardless of `available_parallelism()`.
const MAX_WORKERS: usize = 16;

/// Resolves the worker count to use: `requested` if given, else
/// `available_parallelism()` clamped to `[MIN_WORKERS, MAX_WORKERS]`.
pub fn resolve_worker_count(requested: Option<usize>) -> usize {
    requested.unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(MIN_WORKERS)
            .clamp(MIN_WORKERS, MAX_WORKERS)
    })
}

/// Builds a dedicated `rayon` thread pool sized per [`resolve_worker_count`]. The matching
/// layers call `pool.install(...)` around their `par_iter`/`par_bridge` work so a pipeline run
/// never contends with `rayon`'s global pool (shared with whatever embeds this crate).
pub fn build_pool(requested: Option<usize>) -> MatchResult<rayon::ThreadPool> {
    let workers = resolve_worker_count(requested);
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|err| MatchError::Config(format!("failed to build worker pool: {err}")))
}

/// A cooperative stop flag a driver polls between batches so a long-running invocation can be
/// interrupted without corrupting an in-flight batch.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Constructs a fresh, unset `StopFlag`.
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests a stop. Takes effect at the next batch boundary the driver checks.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once [`StopFlag::request_stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
