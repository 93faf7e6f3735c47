use std::ops::Range;

/// Half-open block `[start, end)` of subsequence starts handled by one task.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Partition {
    pub start: usize,
    pub end: usize,
}

impl Partition {
    #[inline]
    pub fn starts(self) -> Range<usize> {
        self.start..self.end
    }

    #[inline]
    pub fn len(self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.start >= self.end
    }
}

/// Splits `[0, gap)` into at most `max_workers` contiguous non-empty blocks of
/// `ceil(gap / workers)` starts each, the last one truncated at `gap`.
pub fn plan(gap: usize, max_workers: usize) -> Vec<Partition> {
    if gap == 0 {
        return Vec::new();
    }
    let workers = max_workers.clamp(1, gap);
    let per_worker = gap.div_ceil(workers);

    (0..workers)
        .map(|i| Partition {
            start: i * per_worker,
            end: ((i + 1) * per_worker).min(gap),
        })
        .filter(|part| !part.is_empty())
        .collect()
}
