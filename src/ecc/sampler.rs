//! Reproducible degree and chunk index selection.
//!
//! Every droplet's chunk list is a pure function of `(K, table, seed)`. A
//! fresh [`SeededRandom`] is created at the droplet seed for each call, so the
//! encoder and any number of decoders agree on the indices without sharing
//! generator state.

use crate::ecc::prng::{round8, SeededRandom};
use crate::ecc::soliton::RobustSoliton;
use std::collections::BTreeSet;

/// Upper bound of the degree draw; the draw is normalised by `DEGREE_SCALE`
const DEGREE_DRAW_MAX: u64 = 2_147_483_646;
const DEGREE_SCALE: f64 = 2_147_483_647.0;

/// Sample the degree of the droplet with the given seed.
pub fn sample_degree(table: &RobustSoliton, rng: &mut SeededRandom) -> usize {
    let u = round8(rng.next_in(0, DEGREE_DRAW_MAX) as f64 / DEGREE_SCALE);
    table.degree_for(u)
}

/// Chunk indices combined by the droplet with the given seed, sorted ascending.
///
/// Indices are drawn one at a time from `[0, K-1]` and collisions are simply
/// drawn again, consuming generator state, until `degree` distinct indices
/// have been collected.
pub fn chunk_indices(table: &RobustSoliton, seed: u64) -> Vec<usize> {
    let k = table.k();
    let mut rng = SeededRandom::new(seed);

    let degree = sample_degree(table, &mut rng).min(k);
    let upper = (k - 1) as u64;

    let mut picked = BTreeSet::new();
    while picked.len() < degree {
        picked.insert(rng.next_in(0, upper) as usize);
    }

    picked.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_deterministic() {
        for k in [2, 3, 10, 100, 1000] {
            let table = RobustSoliton::new(k).unwrap();
            for seed in [0, 1, 1337, 230_150_332, 2_147_483_647] {
                assert_eq!(chunk_indices(&table, seed), chunk_indices(&table, seed));
            }
        }
    }

    #[test]
    fn test_indices_sorted_distinct_in_range() {
        let table = RobustSoliton::new(64).unwrap();
        let mut rng = SeededRandom::new(5);

        for _ in 0..2_000 {
            let seed = rng.next_seed();
            let indices = chunk_indices(&table, seed);

            assert!(!indices.is_empty());
            assert!(indices.len() <= table.max_degree());
            assert!(indices.windows(2).all(|w| w[0] < w[1]));
            assert!(indices.iter().all(|&i| i < 64));
        }
    }

    #[test]
    fn test_zero_seed_matches_default_seed() {
        let table = RobustSoliton::new(20).unwrap();
        assert_eq!(chunk_indices(&table, 0), chunk_indices(&table, 1337));
    }

    #[test]
    fn test_single_chunk() {
        let table = RobustSoliton::new(1).unwrap();
        for seed in 0..50 {
            assert_eq!(chunk_indices(&table, seed), vec![0]);
        }
    }

    #[test]
    fn test_degree_distribution_favours_low_degrees() {
        let table = RobustSoliton::new(100).unwrap();
        let mut seeds = SeededRandom::new(11);

        let mut degree_counts = vec![0usize; table.max_degree() + 1];
        for _ in 0..2_000 {
            let mut rng = SeededRandom::new(seeds.next_seed());
            let degree = sample_degree(&table, &mut rng);
            assert!(degree >= 1 && degree <= table.max_degree());
            degree_counts[degree] += 1;
        }

        // Degrees 1 and 2 carry a large share of the mass
        assert!(degree_counts[1] > 0);
        assert!(degree_counts[2] > 0);
        let high: usize = degree_counts.iter().skip(20).sum();
        assert!(high < 1_000);
    }

    #[test]
    fn test_known_scenario_indices() {
        let table = RobustSoliton::new(3).unwrap();
        assert_eq!(chunk_indices(&table, 357_692_349), vec![1]);
        assert_eq!(chunk_indices(&table, 1_911_281_105), vec![0, 1]);
    }
}
