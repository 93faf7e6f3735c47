pub mod config;
mod engine;
mod gap_pass;
pub mod partition;
mod pool;

pub use config::{SortConfig, THRESHOLD};
pub use engine::{ParallelSortEngine, SortStats};
pub use gap_pass::{gap_pass, halving_gaps, shell_sort_sequential, subsequence_pass};
pub use partition::Partition;
pub use pool::{ShutdownReport, TaskHandle, WorkerPool};

mod sealed {
    pub trait Sealed {}
}

/// Fixed-width integer keys the sorts accept.
pub trait SortKey: Copy + Ord + Send + Sync + 'static + sealed::Sealed {}

macro_rules! impl_sort_key {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}
            impl SortKey for $ty {}
        )*
    };
}

impl_sort_key!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

#[inline]
pub fn is_sorted_non_decreasing<T: SortKey>(data: &[T]) -> bool {
    data.windows(2).all(|w| w[0] <= w[1])
}
