/// Constants used by block partitioning and block-directory scanning.
pub mod blocks {
    /// Default extension for block files.
    pub const DEFAULT_BLOCK_EXT: &str = "hdf5";
    /// Separator between the zero-padded start and end index in block filenames.
    pub const BLOCK_NAME_SEPARATOR: char = '-';
    /// Extra digits added on top of `floor(log10(n_samples)) + 1`.
    ///
    /// One spare digit keeps every boundary (including `n_samples` itself)
    /// representable at a fixed width, so lexicographic order equals numeric order.
    pub const BLOCK_NAME_SPARE_DIGITS: usize = 1;
    /// Log message used when a corrupt block file is removed.
    pub const REMOVED_CORRUPT_MSG: &str = "removed corrupt block file";
}

/// Constants used by the keyed block container format.
pub mod format {
    /// Magic prefix marking a keyed block container.
    pub const KEYED_BLOCK_MAGIC: &[u8] = b"RBLK";
    /// Version tag for keyed block containers.
    pub const KEYED_BLOCK_VERSION: u8 = 1;
    /// Prefix marker for bitcode-encoded payloads.
    pub const BITCODE_PREFIX: u8 = b'B';
}

/// Constants used by project layout and preprocessing configuration.
pub mod project {
    /// Name of the configuration copy stored within a project directory.
    pub const CONFIG_FILENAME: &str = "config.json";
    /// Subdirectory of a project holding the GPT token datasets.
    pub const DATA_DIRNAME: &str = "data";
    /// Default number of samples per block file.
    pub const DEFAULT_BLOCK_SIZE: u64 = 100_000;
    /// Default seed for GPT dataset construction.
    pub const DEFAULT_GPT_SEED: u64 = 1234;
    /// Default GPT sample length in tokens.
    pub const DEFAULT_GPT_SEQ_LENGTH: usize = 2048;
    /// Default retrieval chunk length in tokens.
    pub const DEFAULT_GPT_CHUNK_LENGTH: usize = 64;
    /// Default train/valid/test split string.
    pub const DEFAULT_GPT_SPLIT: &str = "98,2,0";
}

/// Constants used by fine-tuning dataset glue.
pub mod dataset {
    /// Default maximum number of in-context few-shot examples.
    pub const DEFAULT_MAX_NUM_SHOT: usize = 5;
}
