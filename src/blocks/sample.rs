use std::fmt::Display;

use rand::Rng;
use rand::seq::SliceRandom;

use crate::blocks::partition::BlockPartitioner;
use crate::blocks::shard::{RankBlocks, get_blocks_by_rank};
use crate::distributed::Collective;
use crate::errors::BlockError;
use crate::format::BlockFormat;

/// Reject fractions outside `(0, 1]`.
pub fn check_fraction(fraction: f64) -> Result<(), BlockError> {
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(BlockError::Configuration(format!(
            "sample fraction must be in (0, 1], got {fraction}"
        )))
    }
}

/// Target length after sampling `len` padded entries: `ceil(fraction * len)`.
pub fn sample_len(len: usize, fraction: f64) -> usize {
    ((fraction * len as f64).ceil() as usize).min(len)
}

/// Randomly keep `ceil(fraction * blocks.len())` entries of a padded rank list.
///
/// The target is computed from the padded length, which is identical on
/// every rank, so sampled lists stay equal-length across ranks. Absent
/// markers are dropped before shuffling and re-appended to reach the target.
/// Uses an unseeded thread-local RNG; each rank samples independently.
pub fn sample_blocks<T>(blocks: Vec<Option<T>>, fraction: f64) -> Result<Vec<Option<T>>, BlockError> {
    sample_blocks_with_rng(blocks, fraction, &mut rand::rng())
}

/// [`sample_blocks`] with a caller-provided RNG.
pub fn sample_blocks_with_rng<T, R>(
    blocks: Vec<Option<T>>,
    fraction: f64,
    rng: &mut R,
) -> Result<Vec<Option<T>>, BlockError>
where
    R: Rng + ?Sized,
{
    check_fraction(fraction)?;
    let target = sample_len(blocks.len(), fraction);
    let mut present: Vec<T> = blocks.into_iter().flatten().collect();
    present.shuffle(rng);
    present.truncate(target);
    let mut sampled: Vec<Option<T>> = present.into_iter().map(Some).collect();
    sampled.resize_with(target, || None);
    Ok(sampled)
}

impl RankBlocks {
    /// Subsample both `existing` and `missing` with [`sample_blocks`].
    ///
    /// World counts are left untouched.
    pub fn sample(self, fraction: f64) -> Result<Self, BlockError> {
        Ok(Self {
            existing: sample_blocks(self.existing, fraction)?,
            missing: sample_blocks(self.missing, fraction)?,
            ..self
        })
    }
}

/// Scan, shard by rank, then subsample this rank's blocks by `fraction`.
pub fn get_sampled_blocks_by_rank<F, C, V, E>(
    partition: &BlockPartitioner,
    format: F,
    collective: &C,
    validate: V,
    fraction: f64,
) -> Result<RankBlocks, BlockError>
where
    F: BlockFormat,
    C: Collective + ?Sized,
    V: FnMut(&F::Handle) -> Result<(), E>,
    E: Display,
{
    check_fraction(fraction)?;
    get_blocks_by_rank(partition, format, collective, validate)?.sample(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn present_count_is_ceil_of_fraction() {
        let blocks: Vec<Option<u32>> = (0..10).map(Some).collect();
        for (fraction, expected) in [(1.0, 10), (0.5, 5), (0.25, 3), (0.01, 1)] {
            let sampled = sample_blocks(blocks.clone(), fraction).unwrap();
            assert_eq!(sampled.len(), expected);
            assert_eq!(sampled.iter().flatten().count(), expected);
        }
    }

    #[test]
    fn sampled_entries_come_from_the_input_without_repeats() {
        let blocks: Vec<Option<u32>> = (0..20).map(Some).collect();
        let mut sampled: Vec<u32> = sample_blocks(blocks, 0.5)
            .unwrap()
            .into_iter()
            .flatten()
            .collect();
        sampled.sort_unstable();
        sampled.dedup();
        assert_eq!(sampled.len(), 10);
        assert!(sampled.iter().all(|value| *value < 20));
    }

    #[test]
    fn padded_input_keeps_padded_target_length() {
        let blocks = vec![Some(1u32), Some(2), None, None];
        let sampled = sample_blocks(blocks, 0.5).unwrap();
        assert_eq!(sampled.len(), 2);

        let sparse = vec![Some(7u32), None, None, None];
        let sampled = sample_blocks(sparse, 0.75).unwrap();
        assert_eq!(sampled, vec![Some(7), None, None]);
    }

    #[test]
    fn repeated_sampling_reorders() {
        let blocks: Vec<Option<u32>> = (0..64).map(Some).collect();
        let first = sample_blocks(blocks.clone(), 1.0).unwrap();
        let differs = (0..16).any(|_| sample_blocks(blocks.clone(), 1.0).unwrap() != first);
        assert!(differs);
        assert_eq!(first.iter().flatten().count(), 64);
    }

    #[test]
    fn seeded_rng_is_reproducible() {
        let blocks: Vec<Option<u32>> = (0..32).map(Some).collect();
        let a = sample_blocks_with_rng(blocks.clone(), 0.5, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = sample_blocks_with_rng(blocks, 0.5, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn out_of_range_fractions_are_rejected() {
        for fraction in [0.0, -0.5, 1.5, f64::NAN] {
            assert!(matches!(
                sample_blocks(vec![Some(1u8)], fraction),
                Err(BlockError::Configuration(_))
            ));
        }
    }

    #[test]
    fn empty_input_stays_empty() {
        let sampled = sample_blocks(Vec::<Option<u8>>::new(), 0.3).unwrap();
        assert!(sampled.is_empty());
    }

    #[test]
    fn rank_blocks_sample_keeps_world_counts() {
        let blocks = RankBlocks {
            n_existing_world: 8,
            n_missing_world: 2,
            existing: (0..4).map(|_| None).collect(),
            missing: vec![None],
        };
        let sampled = blocks.sample(0.5).unwrap();
        assert_eq!(sampled.n_existing_world, 8);
        assert_eq!(sampled.n_missing_world, 2);
        assert_eq!(sampled.existing.len(), 2);
        assert_eq!(sampled.missing.len(), 1);
    }
}
