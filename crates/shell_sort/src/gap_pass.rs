use crate::SortKey;

/// Gaps `len / 2, len / 4, ..., 1`. Empty for `len < 2`.
pub fn halving_gaps(len: usize) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(len / 2), |&gap| Some(gap / 2)).take_while(|&gap| gap > 0)
}

/// One stride-`gap` insertion sort pass over the whole slice.
pub fn gap_pass<T: SortKey>(data: &mut [T], gap: usize) {
    debug_assert!(gap > 0, "gap must be positive");
    let len = data.len();
    if gap == 0 || gap >= len {
        return;
    }

    let ptr = data.as_mut_ptr();
    // Hot loop: every index stays in `j - gap .. len`, checked by the loop bounds.
    unsafe {
        for i in gap..len {
            let key = *ptr.add(i);
            let mut j = i;
            while j >= gap {
                let prev = *ptr.add(j - gap);
                if prev <= key {
                    break;
                }
                *ptr.add(j) = prev;
                j -= gap;
            }
            *ptr.add(j) = key;
        }
    }
}

/// Insertion sort restricted to the subsequence `start, start + gap, ...`.
pub fn subsequence_pass<T: SortKey>(data: &mut [T], gap: usize, start: usize) {
    debug_assert!(gap > 0, "gap must be positive");
    if gap == 0 {
        return;
    }
    // SAFETY: the pointer and length come from a live unique borrow.
    unsafe { subsequence_pass_raw(data.as_mut_ptr(), data.len(), gap, start) }
}

/// Raw form of [`subsequence_pass`], used by pool tasks sharing one slice.
///
/// # Safety
///
/// `ptr` must be valid for reads and writes of `len` elements, `gap` must be
/// positive, and nothing else may access indices congruent to `start` modulo
/// `gap` for the duration of the call.
pub(crate) unsafe fn subsequence_pass_raw<T: SortKey>(
    ptr: *mut T,
    len: usize,
    gap: usize,
    start: usize,
) {
    let mut i = start + gap;
    while i < len {
        unsafe {
            let key = *ptr.add(i);
            let mut j = i;
            while j >= gap {
                let prev = *ptr.add(j - gap);
                if prev <= key {
                    break;
                }
                *ptr.add(j) = prev;
                j -= gap;
            }
            *ptr.add(j) = key;
        }
        i += gap;
    }
}

/// Full ShellSort using only sequential gap passes.
pub fn shell_sort_sequential<T: SortKey>(data: &mut [T]) {
    for gap in halving_gaps(data.len()) {
        gap_pass(data, gap);
    }
}
