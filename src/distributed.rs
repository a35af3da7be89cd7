//! Distributed runtime capabilities used by block bookkeeping.
//!
//! Every collective here follows the lockstep convention: all ranks must call
//! the same collectives in the same order. A rank that skips a `barrier` or
//! `all_reduce_max` call leaves the others blocked forever; this is a caller
//! contract and is not detected.

use std::sync::{Arc, Barrier, Mutex};

use tracing::info;

use crate::errors::BlockError;
use crate::types::Rank;

/// Rank identity plus the blocking collectives the block pipeline needs.
pub trait Collective {
    /// This process's data-parallel rank.
    fn rank(&self) -> Rank;
    /// Number of data-parallel ranks.
    fn world_size(&self) -> usize;
    /// Block until every rank has reached this call.
    fn barrier(&self);
    /// Block until every rank contributes `value`; return the maximum on every rank.
    fn all_reduce_max(&self, value: u64) -> u64;

    /// True on the coordinating rank (rank 0).
    fn is_leader(&self) -> bool {
        self.rank() == 0
    }
}

impl<C: Collective + ?Sized> Collective for &C {
    fn rank(&self) -> Rank {
        (**self).rank()
    }

    fn world_size(&self) -> usize {
        (**self).world_size()
    }

    fn barrier(&self) {
        (**self).barrier()
    }

    fn all_reduce_max(&self, value: u64) -> u64 {
        (**self).all_reduce_max(value)
    }
}

/// Log `message` at info level on the leader only.
pub fn info_rank_0<C: Collective + ?Sized>(collective: &C, message: &str) {
    if collective.is_leader() {
        info!(rank = collective.rank(), "{message}");
    }
}

/// Validate a `(rank, world_size)` pair.
pub fn check_rank(rank: Rank, world_size: usize) -> Result<(), BlockError> {
    if world_size == 0 {
        return Err(BlockError::Configuration(
            "world size must be at least 1".into(),
        ));
    }
    if rank >= world_size {
        return Err(BlockError::Configuration(format!(
            "rank {rank} out of range for world size {world_size}"
        )));
    }
    Ok(())
}

/// Single-process runtime: rank 0 of a world of one.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalCollective;

impl Collective for LocalCollective {
    fn rank(&self) -> Rank {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn all_reduce_max(&self, value: u64) -> u64 {
        value
    }
}

struct ReduceSlot {
    max: u64,
    arrived: usize,
}

struct GroupState {
    world_size: usize,
    barrier: Barrier,
    slot: Mutex<ReduceSlot>,
    result: Mutex<u64>,
}

/// In-process collective group where each rank runs on its own thread.
///
/// Build one member per rank with [`ThreadGroup::new`] and move each member
/// into its thread.
#[derive(Clone)]
pub struct ThreadGroup {
    rank: Rank,
    state: Arc<GroupState>,
}

impl ThreadGroup {
    /// Create the members of a group of `world_size` ranks, ordered by rank.
    pub fn new(world_size: usize) -> Result<Vec<Self>, BlockError> {
        check_rank(0, world_size)?;
        let state = Arc::new(GroupState {
            world_size,
            barrier: Barrier::new(world_size),
            slot: Mutex::new(ReduceSlot { max: 0, arrived: 0 }),
            result: Mutex::new(0),
        });
        Ok((0..world_size)
            .map(|rank| Self {
                rank,
                state: Arc::clone(&state),
            })
            .collect())
    }
}

impl Collective for ThreadGroup {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.state.world_size
    }

    fn barrier(&self) {
        self.state.barrier.wait();
    }

    fn all_reduce_max(&self, value: u64) -> u64 {
        {
            let mut slot = self
                .state
                .slot
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slot.max = if slot.arrived == 0 {
                value
            } else {
                slot.max.max(value)
            };
            slot.arrived += 1;
            if slot.arrived == self.state.world_size {
                *self
                    .state
                    .result
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner()) = slot.max;
                slot.arrived = 0;
            }
        }
        // First wait publishes the result; second keeps the next reduction
        // from overwriting it before every rank has read it.
        self.state.barrier.wait();
        let result = *self
            .state
            .result
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        self.state.barrier.wait();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn local_collective_is_a_world_of_one() {
        let local = LocalCollective;
        assert!(local.is_leader());
        assert_eq!(local.world_size(), 1);
        assert_eq!(local.all_reduce_max(7), 7);
        local.barrier();
        info_rank_0(&local, "world of one");
    }

    #[test]
    fn thread_group_reduces_max_on_every_rank() {
        let members = ThreadGroup::new(4).unwrap();
        let results: Vec<(u64, u64)> = thread::scope(|scope| {
            let handles: Vec<_> = members
                .into_iter()
                .map(|member| {
                    scope.spawn(move || {
                        let first = member.all_reduce_max(member.rank() as u64 * 10);
                        let second = member.all_reduce_max(100 - member.rank() as u64);
                        (first, second)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results, vec![(30, 100); 4]);
    }

    #[test]
    fn check_rank_rejects_out_of_range() {
        assert!(check_rank(0, 1).is_ok());
        assert!(check_rank(1, 1).is_err());
        assert!(check_rank(0, 0).is_err());
        assert!(ThreadGroup::new(0).is_err());
    }
}
