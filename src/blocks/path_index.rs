use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::blocks::BLOCK_NAME_SEPARATOR;
use crate::errors::BlockError;
use crate::transport::fs::BlockDirectory;
use crate::types::{BlockRange, SampleIndex};

/// Maps a sample index to the block file containing it.
///
/// Built from a directory of `start-end.ext` files of uniform `block_size`
/// (the final block may be shorter). Immutable once built.
#[derive(Clone, Debug)]
pub struct BlockPathIndex {
    block_path_map: HashMap<SampleIndex, PathBuf>,
    max_idx: SampleIndex,
    block_size: u64,
}

impl BlockPathIndex {
    /// Index every `*.ext` file in `dir`, in file-name order.
    pub fn from_dir(dir: impl AsRef<Path>, block_size: u64, ext: &str) -> Result<Self, BlockError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(BlockError::NotADirectory(dir.to_path_buf()));
        }
        let paths = BlockDirectory::new(dir).list_with_extension(ext)?;
        Self::new(paths, block_size)
    }

    /// Index an explicit list of block paths.
    pub fn new<I, P>(block_paths: I, block_size: u64) -> Result<Self, BlockError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        if block_size == 0 {
            return Err(BlockError::Configuration(
                "block size must be greater than zero".into(),
            ));
        }
        let mut block_path_map = HashMap::new();
        let mut max_idx = 0;
        for path in block_paths {
            let path = path.into();
            let (start_idx, end_idx) = parse_block_range(&path)?;
            block_path_map.insert(start_idx, path);
            max_idx = max_idx.max(end_idx);
        }
        Ok(Self {
            block_path_map,
            max_idx,
            block_size,
        })
    }

    /// Path of the block containing `index`.
    pub fn lookup(&self, index: SampleIndex) -> Result<&Path, BlockError> {
        let block_start = self.block_size * (index / self.block_size);
        self.block_path_map
            .get(&block_start)
            .map(PathBuf::as_path)
            .ok_or(BlockError::BlockNotFound { index, block_start })
    }

    /// Highest end index seen across indexed blocks.
    pub fn max_idx(&self) -> SampleIndex {
        self.max_idx
    }

    /// Samples per block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Number of indexed block files.
    pub fn len(&self) -> usize {
        self.block_path_map.len()
    }

    /// True when no block files were indexed.
    pub fn is_empty(&self) -> bool {
        self.block_path_map.is_empty()
    }
}

impl fmt::Display for BlockPathIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} paths", self.block_path_map.len())
    }
}

/// Parse `(start_idx, end_idx)` from a `start-end.ext` file name.
pub fn parse_block_range(path: &Path) -> Result<BlockRange, BlockError> {
    let invalid = || BlockError::InvalidBlockName {
        path: path.to_path_buf(),
    };
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let (start, end) = stem.split_once(BLOCK_NAME_SEPARATOR).ok_or_else(invalid)?;
    let start_idx = start.parse::<SampleIndex>().map_err(|_| invalid())?;
    let end_idx = end.parse::<SampleIndex>().map_err(|_| invalid())?;
    Ok((start_idx, end_idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::partition::BlockPartitioner;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_zero_padded_names() {
        assert_eq!(
            parse_block_range(Path::new("/d/0100-0200.hdf5")).unwrap(),
            (100, 200)
        );
        assert!(matches!(
            parse_block_range(Path::new("/d/0100_0200.hdf5")),
            Err(BlockError::InvalidBlockName { .. })
        ));
        assert!(parse_block_range(Path::new("/d/a-b.hdf5")).is_err());
        assert!(parse_block_range(Path::new("/d/1-2-3.hdf5")).is_err());
    }

    #[test]
    fn maps_indices_to_containing_blocks() {
        let index = BlockPathIndex::new(
            ["/d/0000-0100.hdf5", "/d/0100-0200.hdf5", "/d/0200-0250.hdf5"],
            100,
        )
        .unwrap();
        assert_eq!(index.lookup(0).unwrap(), Path::new("/d/0000-0100.hdf5"));
        assert_eq!(index.lookup(99).unwrap(), Path::new("/d/0000-0100.hdf5"));
        assert_eq!(index.lookup(100).unwrap(), Path::new("/d/0100-0200.hdf5"));
        assert_eq!(index.lookup(249).unwrap(), Path::new("/d/0200-0250.hdf5"));
        assert_eq!(index.max_idx(), 250);
        assert_eq!(index.to_string(), "3 paths");
    }

    #[test]
    fn lookup_outside_indexed_range_fails() {
        let index = BlockPathIndex::new(["/d/0000-0100.hdf5", "/d/0200-0250.hdf5"], 100).unwrap();
        match index.lookup(150) {
            Err(BlockError::BlockNotFound { index, block_start }) => {
                assert_eq!(index, 150);
                assert_eq!(block_start, 100);
            }
            other => panic!("expected BlockNotFound, got {other:?}"),
        }
        assert!(index.lookup(300).is_err());
    }

    #[test]
    fn from_dir_requires_a_directory() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            BlockPathIndex::from_dir(&file, 10, "hdf5"),
            Err(BlockError::NotADirectory(_))
        ));
    }

    #[test]
    fn round_trips_a_materialized_partition() {
        let temp = tempdir().unwrap();
        let partition = BlockPartitioner::new(temp.path(), 1_234, 100).unwrap();
        let blocks = partition.blocks();
        for block in &blocks {
            fs::write(&block.path, b"x").unwrap();
        }
        fs::write(temp.path().join("config.json"), b"{}").unwrap();

        let index = BlockPathIndex::from_dir(temp.path(), 100, "hdf5").unwrap();
        assert_eq!(index.len(), blocks.len());
        assert_eq!(index.max_idx(), 1_234);
        for sample in 0..partition.n_samples() {
            let path = index.lookup(sample).unwrap();
            let block = blocks.iter().find(|b| b.path == path).unwrap();
            assert!(block.contains(sample));
        }
    }
}
