use anyhow::{Context, Result};
use tracing::{debug, trace, warn};

use crate::config::{SHUTDOWN_GRACE, SortConfig};
use crate::gap_pass::{gap_pass, halving_gaps, shell_sort_sequential, subsequence_pass_raw};
use crate::partition::{self, Partition};
use crate::pool::{ShutdownReport, WorkerPool};
use crate::SortKey;

/// Called by a task before it sorts the subsequence `start` of `gap`.
type TaskHook = fn(gap: usize, start: usize);

fn no_hook(_gap: usize, _start: usize) {}

/// How one gap phase was carried out.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum GapOutcome {
    Sequential,
    Parallel { tasks: usize },
    Recovered { tasks: usize },
}

/// Counters for a single `sort` call.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SortStats {
    pub sequential_phases: usize,
    pub parallel_phases: usize,
    /// Parallel phases that failed and were redone with a full gap pass.
    pub recovered_phases: usize,
    pub tasks_dispatched: usize,
}

impl SortStats {
    fn record(&mut self, outcome: GapOutcome) {
        match outcome {
            GapOutcome::Sequential => self.sequential_phases += 1,
            GapOutcome::Parallel { tasks } => {
                self.parallel_phases += 1;
                self.tasks_dispatched += tasks;
            }
            GapOutcome::Recovered { tasks } => {
                self.recovered_phases += 1;
                self.tasks_dispatched += tasks;
            }
        }
    }
}

/// Slice handed to pool tasks as a raw pointer so several tasks can work on
/// disjoint subsequences at once.
struct SharedSlice<T> {
    ptr: *mut T,
    len: usize,
}

impl<T> Clone for SharedSlice<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SharedSlice<T> {}

// SAFETY: tasks only touch indices of their own subsequences, and every task
// is joined before the borrow the pointer came from is used again.
unsafe impl<T: Send> Send for SharedSlice<T> {}

/// ShellSort over a halving gap sequence, splitting wide gaps across an owned
/// worker pool.
///
/// A gap phase is parallel only when the input is at least
/// [`SortConfig::threshold`] long and the gap is wide enough to give every
/// worker a subsequence (see [`SortConfig::parallelizes_gap`]). All tasks of
/// a phase are joined before the next gap starts. If any of them fails, the
/// whole gap is redone with [`gap_pass`], so `sort` always returns ordered
/// data.
pub struct ParallelSortEngine {
    pool: WorkerPool,
    config: SortConfig,
}

impl ParallelSortEngine {
    pub fn new(config: SortConfig) -> Result<Self> {
        let config = config.with_max_workers(config.max_workers);
        let pool = WorkerPool::new(config.max_workers)
            .context("failed to start shell sort worker pool")?;
        debug!(
            threshold = config.threshold,
            max_workers = config.max_workers,
            "parallel sort engine ready"
        );
        Ok(Self { pool, config })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(SortConfig::default())
    }

    #[inline]
    pub fn config(&self) -> &SortConfig {
        &self.config
    }

    pub fn sort<T: SortKey>(&self, data: &mut [T]) {
        self.sort_with_stats(data);
    }

    pub fn sort_with_stats<T: SortKey>(&self, data: &mut [T]) -> SortStats {
        self.run(data, no_hook)
    }

    /// Releases the worker pool. Later sorts still succeed, sequentially.
    pub fn shutdown(&self) -> ShutdownReport {
        self.pool.shutdown(SHUTDOWN_GRACE)
    }

    fn run<T: SortKey>(&self, data: &mut [T], hook: TaskHook) -> SortStats {
        let mut stats = SortStats::default();
        let len = data.len();

        if len < self.config.threshold {
            debug!(len, "below threshold; sorting sequentially");
            shell_sort_sequential(data);
            stats.sequential_phases = halving_gaps(len).count();
            return stats;
        }

        debug!(len, workers = self.config.max_workers, "running gap loop");
        for gap in halving_gaps(len) {
            let outcome = self.run_gap(data, gap, hook);
            trace!(gap, ?outcome, "gap phase done");
            stats.record(outcome);
        }
        stats
    }

    fn run_gap<T: SortKey>(&self, data: &mut [T], gap: usize, hook: TaskHook) -> GapOutcome {
        if !self.config.parallelizes_gap(gap) {
            gap_pass(data, gap);
            return GapOutcome::Sequential;
        }

        let (tasks, result) = self.dispatch_gap(data, gap, hook);
        match result {
            Ok(()) => GapOutcome::Parallel { tasks },
            Err(err) => {
                warn!(gap, tasks, error = %err, "parallel gap phase failed; redoing it sequentially");
                gap_pass(data, gap);
                GapOutcome::Recovered { tasks }
            }
        }
    }

    /// Dispatches one task per partition of `[0, gap)` and joins all of them.
    /// Returns the number of dispatched tasks and the first failure seen.
    fn dispatch_gap<T: SortKey>(
        &self,
        data: &mut [T],
        gap: usize,
        hook: TaskHook,
    ) -> (usize, Result<()>) {
        let shared = SharedSlice {
            ptr: data.as_mut_ptr(),
            len: data.len(),
        };
        let plan = partition::plan(gap, self.config.max_workers);

        let mut first_err = None;
        let mut handles = Vec::with_capacity(plan.len());
        for part in plan {
            match self
                .pool
                .execute(move || sort_partition(shared, gap, part, hook))
            {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    first_err = Some(err);
                    break;
                }
            }
        }

        let tasks = handles.len();
        // Barrier: no task may still hold `shared` once this loop ends.
        for handle in handles {
            if let Err(err) = handle.join() {
                first_err.get_or_insert(err);
            }
        }

        (tasks, first_err.map_or(Ok(()), Err))
    }
}

fn sort_partition<T: SortKey>(shared: SharedSlice<T>, gap: usize, part: Partition, hook: TaskHook) {
    for start in part.starts() {
        hook(gap, start);
        // SAFETY: partitions of one gap are disjoint, so no other task touches
        // indices congruent to `start`, and the dispatcher joins this task
        // before releasing the slice.
        unsafe { subsequence_pass_raw(shared.ptr, shared.len, gap, start) }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::is_sorted_non_decreasing;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    /// Engine that takes the gap loop for any non-empty input.
    fn eager_engine(workers: usize) -> ParallelSortEngine {
        init_tracing();
        ParallelSortEngine::new(SortConfig::default().with_threshold(0).with_max_workers(workers))
            .unwrap()
    }

    fn sequential_engine() -> ParallelSortEngine {
        init_tracing();
        ParallelSortEngine::new(
            SortConfig::default()
                .with_threshold(usize::MAX)
                .with_max_workers(2),
        )
        .unwrap()
    }

    fn assert_sorts_like_std(engine: &ParallelSortEngine, data: &[i32]) {
        let mut actual = data.to_vec();
        engine.sort(&mut actual);

        let mut expected = data.to_vec();
        expected.sort_unstable();

        assert_eq!(actual, expected, "input_len={}", data.len());
    }

    fn panic_on_gap_eight(gap: usize, start: usize) {
        if gap == 8 && start == 5 {
            panic!("injected task failure");
        }
    }

    fn panic_on_every_task(_gap: usize, _start: usize) {
        panic!("injected task failure");
    }

    #[test]
    fn edge_cases_on_both_paths() {
        let cases = [
            vec![],
            vec![5],
            vec![1, 2, 3, 4, 5, 6],
            vec![6, 5, 4, 3, 2, 1],
            vec![7; 128],
            vec![i32::MIN, 1, i32::MAX, 0, i32::MAX - 1, -2],
            vec![5, 5, 3, 3, 1, 1, 4, 4, 2, 2, 0, 0],
        ];

        let sequential = sequential_engine();
        let eager = eager_engine(2);
        for case in &cases {
            assert_sorts_like_std(&sequential, case);
            assert_sorts_like_std(&eager, case);
        }
    }

    #[test]
    fn known_small_input_on_both_paths() {
        let input = [64, 34, 25, 12, 22, 11, 35, 14];
        let expected = [11, 12, 14, 22, 25, 34, 35, 64];

        let mut sequential = input;
        let stats = sequential_engine().sort_with_stats(&mut sequential);
        assert_eq!(sequential, expected);
        assert_eq!(stats.parallel_phases, 0);
        assert_eq!(stats.sequential_phases, 3);

        let mut parallel = input;
        let stats = eager_engine(2).sort_with_stats(&mut parallel);
        assert_eq!(parallel, expected);
        // Gap 4 splits across both workers; gaps 2 and 1 stay inline.
        assert_eq!(stats.parallel_phases, 1);
        assert_eq!(stats.tasks_dispatched, 2);
        assert_eq!(stats.sequential_phases, 2);
    }

    #[test]
    fn paths_agree_below_threshold() {
        let mut rng = StdRng::seed_from_u64(0x5EED_2026);
        let sequential = sequential_engine();
        let eager = eager_engine(3);
        for &size in &[2_usize, 3, 8, 31, 64, 127, 511, 2048] {
            let base = (0..size).map(|_| rng.random::<i32>()).collect::<Vec<_>>();

            let mut a = base.clone();
            sequential.sort(&mut a);
            let mut b = base.clone();
            eager.sort(&mut b);

            assert_eq!(a, b, "size={size}");
            assert!(is_sorted_non_decreasing(&a));
        }
    }

    #[test]
    fn large_input_matches_reference_sort() {
        init_tracing();
        let engine = ParallelSortEngine::new(SortConfig::default().with_max_workers(4)).unwrap();
        let mut rng = bench::default_rng();
        let base = bench::random_keys(&mut rng, 60_000, bench::RANDOM_KEY_BOUND);

        let mut reference = base.clone();
        shell_sort_sequential(&mut reference);

        let mut actual = base.clone();
        let stats = engine.sort_with_stats(&mut actual);

        assert_eq!(actual, reference);
        assert!(is_sorted_non_decreasing(&actual));
        assert!(stats.parallel_phases > 0);
        assert_eq!(stats.recovered_phases, 0);
        assert_eq!(
            stats.parallel_phases + stats.sequential_phases,
            halving_gaps(base.len()).count()
        );
    }

    #[test]
    fn threshold_selects_path() {
        let engine = ParallelSortEngine::new(
            SortConfig::default()
                .with_threshold(1_000)
                .with_max_workers(2),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(0xC0DE_2026);

        let mut below = (0..999).map(|_| rng.random::<i16>()).collect::<Vec<_>>();
        let stats = engine.sort_with_stats(&mut below);
        assert_eq!(stats.parallel_phases, 0);
        assert!(is_sorted_non_decreasing(&below));

        let mut at = (0..1_000).map(|_| rng.random::<i16>()).collect::<Vec<_>>();
        let stats = engine.sort_with_stats(&mut at);
        assert!(stats.parallel_phases > 0);
        assert!(is_sorted_non_decreasing(&at));
    }

    #[test]
    fn sorting_sorted_input_is_identity() {
        let engine = eager_engine(4);
        let mut data = (0..10_000_i64).map(|x| x * 3 - 7).collect::<Vec<_>>();
        let before = data.clone();
        engine.sort(&mut data);
        assert_eq!(data, before);
        engine.sort(&mut data);
        assert_eq!(data, before);
    }

    #[test]
    fn many_duplicates_and_unsigned_keys() {
        let engine = eager_engine(3);
        let mut rng = StdRng::seed_from_u64(0xD0D1_2026);
        let mut data = (0..4096)
            .map(|_| (rng.random::<u64>() % 16) * 17)
            .collect::<Vec<_>>();
        let mut expected = data.clone();
        expected.sort_unstable();
        engine.sort(&mut data);
        assert_eq!(data, expected);
    }

    #[test]
    fn failed_task_phase_is_recovered() {
        let engine = eager_engine(4);
        let mut rng = StdRng::seed_from_u64(0xFA11_2026);
        let base = (0..64).map(|_| rng.random_range(-1_000..1_000)).collect::<Vec<i32>>();
        let mut expected = base.clone();
        expected.sort_unstable();

        let mut data = base.clone();
        let stats = engine.run(&mut data, panic_on_gap_eight);

        assert_eq!(data, expected);
        // Gaps 32, 16, 8 and 4 go parallel; only gap 8 fails.
        assert_eq!(stats.recovered_phases, 1);
        assert_eq!(stats.parallel_phases, 3);
        assert_eq!(stats.sequential_phases, 2);
    }

    #[test]
    fn every_phase_failing_still_sorts() {
        let engine = eager_engine(2);
        let mut rng = StdRng::seed_from_u64(0xBAD0_2026);
        let base = (0..1_500).map(|_| rng.random::<i32>()).collect::<Vec<_>>();
        let mut expected = base.clone();
        expected.sort_unstable();

        let mut data = base.clone();
        let stats = engine.run(&mut data, panic_on_every_task);

        assert_eq!(data, expected);
        assert_eq!(stats.parallel_phases, 0);
        assert!(stats.recovered_phases > 0);
    }

    #[test]
    fn sorts_after_pool_shutdown() {
        let engine = eager_engine(2);
        assert_eq!(engine.shutdown(), ShutdownReport::Graceful);
        assert_eq!(engine.shutdown(), ShutdownReport::AlreadyShutDown);

        let mut rng = StdRng::seed_from_u64(0x0FF_2026);
        let base = (0..3_000).map(|_| rng.random::<i32>()).collect::<Vec<_>>();
        let mut expected = base.clone();
        expected.sort_unstable();

        let mut data = base;
        let stats = engine.sort_with_stats(&mut data);
        assert_eq!(data, expected);
        assert_eq!(stats.parallel_phases, 0);
        assert_eq!(stats.tasks_dispatched, 0);
        assert!(stats.recovered_phases > 0);
    }
}
