use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::errors::BlockError;

/// Filesystem view over one flat directory of block files.
pub struct BlockDirectory {
    root: PathBuf,
    follow_links: bool,
}

impl BlockDirectory {
    /// Create a view rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: true,
        }
    }

    /// Configure symlink traversal. Links are followed by default, so a
    /// symlinked block lists exactly when [`block_exists`] reports it.
    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Directory this view lists.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files directly under the root whose extension is `ext`, sorted by file name.
    ///
    /// Hidden files (leading `.`) and dangling symlinks are skipped, matching
    /// `*.ext` globbing. A missing root yields an empty list; the root is
    /// created lazily by writers.
    pub fn list_with_extension(&self, ext: &str) -> Result<Vec<PathBuf>, BlockError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if is_dangling_link(&err) => continue,
                Err(err) => {
                    return Err(match err.into_io_error() {
                        Some(io_err) => BlockError::Io(io_err),
                        None => BlockError::Configuration("symlink loop in block directory".into()),
                    });
                }
            };
            if entry.file_type().is_file()
                && !is_hidden(entry.path())
                && has_extension(entry.path(), ext)
            {
                paths.push(entry.path().to_path_buf());
            }
        }
        Ok(paths)
    }
}

fn is_dangling_link(err: &walkdir::Error) -> bool {
    err.io_error()
        .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'))
}

/// True if the path has extension `ext` (case-sensitive, matching `*.ext` globbing).
pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|found| found.to_str())
        .map(|found| found == ext)
        .unwrap_or(false)
}

/// Best-effort existence check for a block file.
pub fn block_exists(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
