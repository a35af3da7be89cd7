/// Filesystem listing helpers for block directories.
pub mod fs;
