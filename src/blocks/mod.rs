//! Block partitioning, directory repair, rank sharding, and block lookup.
//!
//! A preprocessing stage writes its output as a sequence of block files,
//! each covering a fixed-size slice of `[0, n_samples)`. The helpers here
//! work out which blocks exist, heal corrupt ones, and split the remaining
//! work across data-parallel ranks.

/// Fixed-size block ranges and their file paths.
pub mod partition;
/// Sample index to block path lookup.
pub mod path_index;
/// Random per-rank block subsampling.
pub mod sample;
/// Leader-side validation and repair of block directories.
pub mod scan;
/// Interleaved rank sharding with uniform padding.
pub mod shard;

pub use partition::{BlockDescriptor, BlockPartitioner, block_file_name, block_name_width};
pub use path_index::{BlockPathIndex, parse_block_range};
pub use sample::{get_sampled_blocks_by_rank, sample_blocks, sample_blocks_with_rng};
pub use scan::{BlockFileScanner, BlockSet, accept_all, get_blocks};
pub use shard::{RankBlocks, get_blocks_by_rank, interleave, pad_to, shard_by_rank};
