use std::time::Duration;

/// Inputs shorter than this are sorted without touching the worker pool.
pub const THRESHOLD: usize = 50_000;

/// Gaps below this never go parallel, whatever the worker count.
pub const MIN_PARALLEL_GAP: usize = 4;

/// How long `shutdown` waits for queued and running tasks before detaching.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(60);

/// Hardware concurrency, never less than one.
pub fn default_max_workers() -> usize {
    num_cpus::get().max(1)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SortConfig {
    pub threshold: usize,
    pub max_workers: usize,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            threshold: THRESHOLD,
            max_workers: default_max_workers(),
        }
    }
}

impl SortConfig {
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Whether a phase with this gap has enough subsequences to split.
    #[inline]
    pub fn parallelizes_gap(&self, gap: usize) -> bool {
        gap >= self.max_workers && gap >= MIN_PARALLEL_GAP
    }
}
