use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seeded shuffle split of `0..n` into `(train, test)` row indices.
///
/// The test partition holds `ceil(n * test_fraction)` rows. The same
/// `(n, test_fraction, seed)` always gives the same partition.
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let fraction = if test_fraction.is_finite() {
        test_fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let test_len = ((n as f64) * fraction).ceil() as usize;
    let test_len = test_len.min(n);

    let train = indices.split_off(test_len);
    (train, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_use_ceiling() {
        let (train, test) = train_test_split(101, 0.2, 42);
        assert_eq!(test.len(), 21);
        assert_eq!(train.len(), 80);
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let (train, test) = train_test_split(50, 0.2, 42);
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn deterministic_for_seed() {
        assert_eq!(train_test_split(80, 0.2, 42), train_test_split(80, 0.2, 42));
        assert_ne!(train_test_split(80, 0.2, 42), train_test_split(80, 0.2, 7));
    }

    #[test]
    fn empty_input() {
        let (train, test) = train_test_split(0, 0.2, 42);
        assert!(train.is_empty() && test.is_empty());
    }
}
