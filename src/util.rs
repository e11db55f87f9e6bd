
use rand::Rng;

/// Sample up to `cap` distinct indices from `0..len`.
///
/// If the range is not larger than the cap, all indices are returned in order and no randomness
/// is consumed, so small classes are always searched exhaustively.
pub fn sample_indices<R: Rng + ?Sized>(rng: &mut R, len: usize, cap: usize) -> Vec<usize> {
    if len <= cap {
        (0..len).collect()
    } else {
        rand::seq::index::sample(rng, len, cap).into_vec()
    }
}

/// Draw an ordered triple of distinct indices from `0..len`, or None if there are fewer than
/// three to choose from.
pub fn distinct_triple<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Option<(usize, usize, usize)> {
    if len < 3 {
        return None;
    }
    let idx = rand::seq::index::sample(rng, len, 3);
    Some((idx.index(0), idx.index(1), idx.index(2)))
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn small_ranges_are_exhaustive() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(sample_indices(&mut rng, 4, 25), vec![0, 1, 2, 3]);
        assert_eq!(sample_indices(&mut rng, 0, 25), Vec::<usize>::new());
    }

    #[test]
    fn large_ranges_are_capped() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sample = sample_indices(&mut rng, 100, 25);
        assert_eq!(sample.len(), 25);
        let mut sorted = sample.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 25, "sampled indices must be distinct");
        assert!(sample.iter().all(|&i| i < 100));
    }

    #[test]
    fn triples_are_distinct() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(distinct_triple(&mut rng, 2), None);
        for _ in 0..100 {
            let (a, b, c) = distinct_triple(&mut rng, 5).unwrap();
            assert!(a != b && b != c && a != c);
            assert!(a < 5 && b < 5 && c < 5);
        }
    }

    #[test]
    fn sampling_is_deterministic_per_seed() {
        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);
        assert_eq!(
            sample_indices(&mut rng1, 50, 10),
            sample_indices(&mut rng2, 50, 10)
        );
        assert_eq!(distinct_triple(&mut rng1, 9), distinct_triple(&mut rng2, 9));
    }
}
