use std::time::Duration;

use criterion::BenchmarkGroup;
use criterion::measurement::Measurement;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SMALL_RUNTIME_SAMPLE_SIZE: usize = 15;
const SMALL_RUNTIME_WARM_UP_MS: u64 = 100;
const SMALL_RUNTIME_MEASURE_MS: u64 = 300;
const LARGE_RUNTIME_SAMPLE_SIZE: usize = 10;
const LARGE_RUNTIME_WARM_UP_MS: u64 = 800;
const LARGE_RUNTIME_MEASURE_MS: u64 = 3000;
const RNG_SEED: u64 = 42;

/// Upper bound (exclusive) of generated keys.
pub const RANDOM_KEY_BOUND: i32 = 100_000;

pub fn apply_small_runtime_config<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    group.sample_size(SMALL_RUNTIME_SAMPLE_SIZE);
    group.warm_up_time(Duration::from_millis(SMALL_RUNTIME_WARM_UP_MS));
    group.measurement_time(Duration::from_millis(SMALL_RUNTIME_MEASURE_MS));
}

pub fn apply_large_runtime_config<M: Measurement>(group: &mut BenchmarkGroup<'_, M>) {
    group.sample_size(LARGE_RUNTIME_SAMPLE_SIZE);
    group.warm_up_time(Duration::from_millis(LARGE_RUNTIME_WARM_UP_MS));
    group.measurement_time(Duration::from_millis(LARGE_RUNTIME_MEASURE_MS));
}

pub fn default_rng() -> StdRng {
    StdRng::seed_from_u64(RNG_SEED)
}

/// `len` keys drawn uniformly from `[0, bound)`.
pub fn random_keys<R: Rng + ?Sized>(rng: &mut R, len: usize, bound: i32) -> Vec<i32> {
    if bound <= 0 {
        return vec![0; len];
    }
    (0..len).map(|_| rng.random_range(0..bound)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_stay_in_range_and_are_reproducible() {
        let a = random_keys(&mut default_rng(), 2_048, RANDOM_KEY_BOUND);
        let b = random_keys(&mut default_rng(), 2_048, RANDOM_KEY_BOUND);
        assert_eq!(a, b);
        assert!(a.iter().all(|&x| (0..RANDOM_KEY_BOUND).contains(&x)));
    }

    #[test]
    fn non_positive_bound_yields_zeros() {
        assert_eq!(random_keys(&mut default_rng(), 3, 0), vec![0, 0, 0]);
    }
}
