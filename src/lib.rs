#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Reusable app runners shared by the demo binaries.
pub mod apps;
/// Block partitioning, scanning, sharding, sampling, and lookup.
pub mod blocks;
/// Preprocessing configuration and project layout helpers.
pub mod config;
/// Centralized constants used across blocks, formats, and project layout.
pub mod constants;
/// Dataset-building glue over external dataset collaborators.
pub mod dataset;
/// Distributed runtime capabilities (rank, barrier, all-reduce).
pub mod distributed;
/// Block-file container formats.
pub mod format;
/// Input transports used to list block directories.
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use blocks::{
    BlockDescriptor, BlockFileScanner, BlockPartitioner, BlockPathIndex, BlockSet, RankBlocks,
    get_blocks, get_blocks_by_rank, get_sampled_blocks_by_rank,
};
pub use config::{GptDatasetConfig, RetroPreprocessingConfig};
pub use dataset::{
    BlendPlan, BlendPlanner, DatasetBlender, DatasetRequest, DatasetSplit, Detokenizer,
    SplitDatasetProvider, TextDataset, TokenDataset, TrainValidTest,
    build_train_valid_test_datasets,
};
pub use distributed::{Collective, LocalCollective, ThreadGroup};
pub use errors::BlockError;
pub use format::{BlockFormat, KeyedBlockFile, KeyedBlockFormat};
pub use types::{BlockRange, DataPrefix, EntryKey, Rank, SampleIndex, TokenId};
