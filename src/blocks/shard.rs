use std::fmt::Display;

use crate::blocks::partition::{BlockDescriptor, BlockPartitioner};
use crate::blocks::scan::{BlockSet, get_blocks};
use crate::distributed::{Collective, check_rank, info_rank_0};
use crate::errors::BlockError;
use crate::format::BlockFormat;
use crate::types::Rank;

/// One rank's share of the existing and missing blocks.
///
/// `existing` and `missing` have the same length on every rank; `None`
/// entries pad shorter shares so every rank runs the same number of loop
/// iterations (and therefore the same sequence of collectives).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RankBlocks {
    /// Existing blocks across all ranks, before sharding.
    pub n_existing_world: usize,
    /// Missing blocks across all ranks, before sharding.
    pub n_missing_world: usize,
    /// This rank's existing blocks, padded with `None`.
    pub existing: Vec<Option<BlockDescriptor>>,
    /// This rank's missing blocks, padded with `None`.
    pub missing: Vec<Option<BlockDescriptor>>,
}

impl RankBlocks {
    /// Existing blocks actually assigned to this rank.
    pub fn present_existing(&self) -> impl Iterator<Item = &BlockDescriptor> {
        self.existing.iter().flatten()
    }

    /// Missing blocks actually assigned to this rank.
    pub fn present_missing(&self) -> impl Iterator<Item = &BlockDescriptor> {
        self.missing.iter().flatten()
    }
}

/// Every `world_size`-th item starting at `rank` (`items[rank::world_size]`).
///
/// Interleaving rather than contiguous slicing spreads any cost trend along
/// the list evenly across ranks.
pub fn interleave<T: Clone>(items: &[T], rank: Rank, world_size: usize) -> Vec<T> {
    items
        .iter()
        .skip(rank)
        .step_by(world_size.max(1))
        .cloned()
        .collect()
}

/// Wrap `items` in `Some` and append `None` until the list has `len` entries.
pub fn pad_to<T>(items: Vec<T>, len: usize) -> Vec<Option<T>> {
    let mut padded: Vec<Option<T>> = items.into_iter().map(Some).collect();
    if padded.len() < len {
        padded.resize_with(len, || None);
    }
    padded
}

/// Split `blocks` across the ranks of `collective`.
///
/// Performs two `all_reduce_max` collectives (existing, then missing); every
/// rank must call this at the same point.
pub fn shard_by_rank<C>(blocks: BlockSet, collective: &C) -> Result<RankBlocks, BlockError>
where
    C: Collective + ?Sized,
{
    let rank = collective.rank();
    let world_size = collective.world_size();
    check_rank(rank, world_size)?;

    let rank_existing = interleave(&blocks.existing, rank, world_size);
    let rank_missing = interleave(&blocks.missing, rank, world_size);

    let max_existing = collective.all_reduce_max(rank_existing.len() as u64) as usize;
    let max_missing = collective.all_reduce_max(rank_missing.len() as u64) as usize;

    Ok(RankBlocks {
        n_existing_world: blocks.existing.len(),
        n_missing_world: blocks.missing.len(),
        existing: pad_to(rank_existing, max_existing),
        missing: pad_to(rank_missing, max_missing),
    })
}

/// Scan the block directory and return this rank's evenly split share.
pub fn get_blocks_by_rank<F, C, V, E>(
    partition: &BlockPartitioner,
    format: F,
    collective: &C,
    validate: V,
) -> Result<RankBlocks, BlockError>
where
    F: BlockFormat,
    C: Collective + ?Sized,
    V: FnMut(&F::Handle) -> Result<(), E>,
    E: Display,
{
    let blocks = get_blocks(partition, format, collective, validate)?;
    info_rank_0(
        collective,
        &format!(
            "{} blocks in '{}': {} existing, {} missing",
            blocks.len(),
            partition.dir().display(),
            blocks.existing.len(),
            blocks.missing.len()
        ),
    );
    shard_by_rank(blocks, collective)
}
