use std::collections::HashSet;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::blocks::partition::{BlockDescriptor, BlockPartitioner};
use crate::constants::blocks::REMOVED_CORRUPT_MSG;
use crate::distributed::Collective;
use crate::errors::BlockError;
use crate::format::BlockFormat;
use crate::transport::fs::{BlockDirectory, block_exists};

/// All blocks of a partition, split by whether their file exists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockSet {
    /// Blocks whose file is present after cleanup.
    pub existing: Vec<BlockDescriptor>,
    /// Blocks whose file is absent and still needs to be produced.
    pub missing: Vec<BlockDescriptor>,
}

impl BlockSet {
    /// Total number of blocks in the partition.
    pub fn len(&self) -> usize {
        self.existing.len() + self.missing.len()
    }

    /// True when the partition has no blocks.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Validates and repairs a directory of block files.
///
/// The scan is a two-phase protocol. The leader first removes every block
/// file that cannot be opened or fails validation, then all ranks meet at a
/// barrier, then every rank reads the directory state. Only the leader
/// mutates the directory.
pub struct BlockFileScanner<F> {
    format: F,
}

impl<F: BlockFormat> BlockFileScanner<F> {
    /// Create a scanner that opens block files with `format`.
    pub fn new(format: F) -> Self {
        Self { format }
    }

    /// Scan with explicit leadership and barrier capabilities.
    ///
    /// `validate` runs against each opened block on the leader; an `Err`
    /// removes the file. Open and validation failures are healed silently.
    /// A block-extension file that is not one of the partition's paths is an
    /// [`BlockError::UnexpectedFile`]; it aborts the leader before the
    /// barrier, so the job must be torn down.
    pub fn scan<V, E, B>(
        &self,
        partition: &BlockPartitioner,
        is_leader: bool,
        barrier: B,
        mut validate: V,
    ) -> Result<BlockSet, BlockError>
    where
        V: FnMut(&F::Handle) -> Result<(), E>,
        E: Display,
        B: FnOnce(),
    {
        let all_blocks = partition.blocks();

        if is_leader {
            self.check_unexpected_files(partition, &all_blocks)?;
            self.remove_corrupt_blocks(&all_blocks, &mut validate)?;
        }

        barrier();

        let (existing, missing): (Vec<_>, Vec<_>) = all_blocks
            .into_iter()
            .partition(|block| block_exists(&block.path));
        Ok(BlockSet { existing, missing })
    }

    /// Scan using `collective` for leadership and the barrier.
    pub fn scan_with<C, V, E>(
        &self,
        partition: &BlockPartitioner,
        collective: &C,
        validate: V,
    ) -> Result<BlockSet, BlockError>
    where
        C: Collective + ?Sized,
        V: FnMut(&F::Handle) -> Result<(), E>,
        E: Display,
    {
        self.scan(
            partition,
            collective.is_leader(),
            || collective.barrier(),
            validate,
        )
    }

    fn check_unexpected_files(
        &self,
        partition: &BlockPartitioner,
        all_blocks: &[BlockDescriptor],
    ) -> Result<(), BlockError> {
        let expected: HashSet<&Path> = all_blocks.iter().map(|b| b.path.as_path()).collect();
        let listed = BlockDirectory::new(partition.dir()).list_with_extension(partition.extension())?;
        match listed.into_iter().find(|path| !expected.contains(path.as_path())) {
            Some(path) => Err(BlockError::UnexpectedFile { path }),
            None => Ok(()),
        }
    }

    fn remove_corrupt_blocks<V, E>(
        &self,
        all_blocks: &[BlockDescriptor],
        validate: &mut V,
    ) -> Result<(), BlockError>
    where
        V: FnMut(&F::Handle) -> Result<(), E>,
        E: Display,
    {
        let existing: Vec<&PathBuf> = all_blocks
            .iter()
            .map(|block| &block.path)
            .filter(|path| block_exists(path))
            .collect();
        let total = existing.len();
        let mut removed = 0usize;
        for (index, path) in existing.into_iter().enumerate() {
            debug!(path = %path.display(), index, total, "validating block");
            let failure = match self.format.open(path) {
                Err(err) => Some(err.to_string()),
                Ok(handle) => {
                    let outcome = validate(&handle).err().map(|err| err.to_string());
                    drop(handle);
                    outcome
                }
            };
            if let Some(error) = failure {
                remove_block_file(path)?;
                removed += 1;
                warn!(path = %path.display(), error = %error, "{REMOVED_CORRUPT_MSG}");
            }
        }
        info!(validated = total, removed, "block directory validated");
        Ok(())
    }
}

fn remove_block_file(path: &Path) -> Result<(), BlockError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Scan the partition's directory and split its blocks into existing and missing.
pub fn get_blocks<F, C, V, E>(
    partition: &BlockPartitioner,
    format: F,
    collective: &C,
    validate: V,
) -> Result<BlockSet, BlockError>
where
    F: BlockFormat,
    C: Collective + ?Sized,
    V: FnMut(&F::Handle) -> Result<(), E>,
    E: Display,
{
    BlockFileScanner::new(format).scan_with(partition, collective, validate)
}

/// Validation callback that accepts every block.
pub fn accept_all<H>(_handle: &H) -> Result<(), BlockError> {
    Ok(())
}
