use std::path::{Path, PathBuf};

use crate::constants::blocks::{BLOCK_NAME_SEPARATOR, BLOCK_NAME_SPARE_DIGITS, DEFAULT_BLOCK_EXT};
use crate::errors::BlockError;
use crate::types::{BlockRange, SampleIndex};

/// One fixed-size slice of the sample range and the file that holds it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BlockDescriptor {
    /// Half-open `(start_idx, end_idx)` sample range.
    pub range: BlockRange,
    /// Expected block file path.
    pub path: PathBuf,
}

impl BlockDescriptor {
    /// First sample index covered by this block.
    pub fn start_idx(&self) -> SampleIndex {
        self.range.0
    }

    /// One past the last sample index covered by this block.
    pub fn end_idx(&self) -> SampleIndex {
        self.range.1
    }

    /// Number of samples in this block.
    pub fn len(&self) -> u64 {
        self.range.1 - self.range.0
    }

    /// True for a zero-length block (never produced by the partitioner).
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `index` falls inside this block's range.
    pub fn contains(&self, index: SampleIndex) -> bool {
        self.range.0 <= index && index < self.range.1
    }
}

/// Divides `[0, n_samples)` into contiguous blocks of `block_size` samples,
/// each backed by a file named `{start}-{end}.{ext}` under `dir`.
#[derive(Clone, Debug)]
pub struct BlockPartitioner {
    dir: PathBuf,
    n_samples: u64,
    block_size: u64,
    ext: String,
}

impl BlockPartitioner {
    /// Create a partitioner; `block_size` must be non-zero.
    pub fn new(dir: impl Into<PathBuf>, n_samples: u64, block_size: u64) -> Result<Self, BlockError> {
        if block_size == 0 {
            return Err(BlockError::Configuration(
                "block size must be greater than zero".into(),
            ));
        }
        Ok(Self {
            dir: dir.into(),
            n_samples,
            block_size,
            ext: DEFAULT_BLOCK_EXT.to_string(),
        })
    }

    /// Use `ext` (without the leading dot) instead of the default `hdf5`.
    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.ext = ext.into().trim_start_matches('.').to_string();
        self
    }

    /// Directory holding the block files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Total number of samples covered.
    pub fn n_samples(&self) -> u64 {
        self.n_samples
    }

    /// Samples per block.
    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Block file extension.
    pub fn extension(&self) -> &str {
        &self.ext
    }

    /// Number of blocks in the partition.
    pub fn block_count(&self) -> usize {
        self.n_samples.div_ceil(self.block_size) as usize
    }

    /// Ordered block ranges tiling `[0, n_samples)`.
    pub fn ranges(&self) -> impl Iterator<Item = BlockRange> + '_ {
        (0..self.n_samples)
            .step_by(self.block_size as usize)
            .map(|start| {
                (start, self.n_samples.min(start.saturating_add(self.block_size)))
            })
    }

    /// Expected file path for `range`.
    pub fn block_path(&self, range: BlockRange) -> PathBuf {
        self.dir
            .join(block_file_name(range, block_name_width(self.n_samples), &self.ext))
    }

    /// All block descriptors, existing on disk or not.
    pub fn blocks(&self) -> Vec<BlockDescriptor> {
        let width = block_name_width(self.n_samples);
        self.ranges()
            .map(|range| BlockDescriptor {
                range,
                path: self.dir.join(block_file_name(range, width, &self.ext)),
            })
            .collect()
    }
}

/// Digit width used to zero-pad block boundaries: `floor(log10(n_samples)) + 2`.
///
/// Wide enough for `n_samples` itself, so names sort in numeric order.
pub fn block_name_width(n_samples: u64) -> usize {
    decimal_digits(n_samples) + BLOCK_NAME_SPARE_DIGITS
}

/// File name for `range` at the given digit `width`.
pub fn block_file_name(range: BlockRange, width: usize, ext: &str) -> String {
    format!(
        "{:0width$}{BLOCK_NAME_SEPARATOR}{:0width$}.{ext}",
        range.0,
        range.1,
        width = width
    )
}

fn decimal_digits(value: u64) -> usize {
    value.checked_ilog10().map_or(1, |log| log as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranges(n_samples: u64, block_size: u64) -> Vec<BlockRange> {
        BlockPartitioner::new("/blocks", n_samples, block_size)
            .unwrap()
            .ranges()
            .collect()
    }

    #[test]
    fn ranges_truncate_the_last_block() {
        assert_eq!(ranges(250, 100), vec![(0, 100), (100, 200), (200, 250)]);
        assert_eq!(ranges(200, 100), vec![(0, 100), (100, 200)]);
        assert_eq!(ranges(5, 100), vec![(0, 5)]);
        assert!(ranges(0, 100).is_empty());
    }

    #[test]
    fn ranges_tile_the_sample_range() {
        for n_samples in [1u64, 7, 99, 100, 101, 1_000, 12_345] {
            for block_size in [1u64, 3, 10, 100, 4_096] {
                let ranges = ranges(n_samples, block_size);
                assert_eq!(ranges.first().map(|r| r.0), Some(0));
                assert_eq!(ranges.last().map(|r| r.1), Some(n_samples));
                for pair in ranges.windows(2) {
                    assert_eq!(pair[0].1, pair[1].0);
                    assert_eq!(pair[0].1 - pair[0].0, block_size);
                }
                let last = ranges.last().unwrap();
                assert!(last.1 - last.0 <= block_size);
            }
        }
    }

    #[test]
    fn oversized_block_size_does_not_overflow() {
        assert_eq!(
            ranges(u64::MAX, u64::MAX - 1),
            vec![(0, u64::MAX - 1), (u64::MAX - 1, u64::MAX)]
        );
        assert_eq!(ranges(u64::MAX, u64::MAX), vec![(0, u64::MAX)]);
    }

    #[test]
    fn zero_block_size_is_rejected() {
        assert!(matches!(
            BlockPartitioner::new("/blocks", 10, 0),
            Err(BlockError::Configuration(_))
        ));
    }

    #[test]
    fn width_is_floor_log10_plus_two() {
        assert_eq!(block_name_width(1), 2);
        assert_eq!(block_name_width(9), 2);
        assert_eq!(block_name_width(10), 3);
        assert_eq!(block_name_width(99), 3);
        assert_eq!(block_name_width(100), 4);
        assert_eq!(block_name_width(250), 4);
        assert_eq!(block_name_width(1_000_000), 8);
    }

    #[test]
    fn paths_are_zero_padded_under_dir() {
        let partitioner = BlockPartitioner::new("/blocks", 250, 100).unwrap();
        let names: Vec<PathBuf> = partitioner.blocks().into_iter().map(|b| b.path).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/blocks/0000-0100.hdf5"),
                PathBuf::from("/blocks/0100-0200.hdf5"),
                PathBuf::from("/blocks/0200-0250.hdf5"),
            ]
        );
        assert_eq!(
            partitioner.block_path((100, 200)),
            PathBuf::from("/blocks/0100-0200.hdf5")
        );
    }

    #[test]
    fn file_names_sort_numerically() {
        let partitioner = BlockPartitioner::new("/blocks", 1_000, 7).unwrap();
        let blocks = partitioner.blocks();
        let mut sorted = blocks.clone();
        sorted.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(sorted, blocks);
        assert_eq!(partitioner.block_count(), blocks.len());
    }

    #[test]
    fn custom_extension_drops_leading_dot() {
        let partitioner = BlockPartitioner::new("/blocks", 20, 10)
            .unwrap()
            .with_extension(".bin");
        assert_eq!(partitioner.extension(), "bin");
        assert_eq!(
            partitioner.blocks()[1].path,
            PathBuf::from("/blocks/010-020.bin")
        );
    }

    #[test]
    fn descriptor_contains_its_range() {
        let block = BlockDescriptor {
            range: (100, 200),
            path: PathBuf::from("/blocks/0100-0200.hdf5"),
        };
        assert_eq!(block.len(), 100);
        assert!(block.contains(100));
        assert!(block.contains(199));
        assert!(!block.contains(200));
        assert!(!block.contains(99));
    }
}
