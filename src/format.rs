//! Block-file container formats.
//!
//! The scanner only needs three capabilities from a block file: it can be
//! opened, the open handle can be validated, and the handle can be closed.
//! Closing is modelled by dropping the handle.

use std::fs;
use std::path::Path;

use crate::constants::format::{BITCODE_PREFIX, KEYED_BLOCK_MAGIC, KEYED_BLOCK_VERSION};
use crate::errors::BlockError;
use crate::types::EntryKey;

/// Opens block files for validation.
pub trait BlockFormat {
    /// Open handle; dropping it closes the file.
    type Handle;

    /// Open `path` read-only. Any error marks the file as corrupt.
    fn open(&self, path: &Path) -> Result<Self::Handle, BlockError>;
}

impl<F: BlockFormat + ?Sized> BlockFormat for &F {
    type Handle = F::Handle;

    fn open(&self, path: &Path) -> Result<Self::Handle, BlockError> {
        (**self).open(path)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, bitcode::Encode, bitcode::Decode)]
struct KeyedPayload {
    entries: Vec<(EntryKey, Vec<u8>)>,
}

/// In-memory keyed container (`key -> bytes`) persisted as one block file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyedBlockFile {
    entries: Vec<(EntryKey, Vec<u8>)>,
}

impl KeyedBlockFile {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry stored under `key`.
    pub fn insert(&mut self, key: impl Into<EntryKey>, value: impl Into<Vec<u8>>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style [`KeyedBlockFile::insert`].
    pub fn with_entry(mut self, key: impl Into<EntryKey>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    /// Bytes stored under `key`, if present.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_slice())
    }

    /// True if an entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Entry keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the container holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize to the on-disk layout: magic, version, bitcode payload.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload = bitcode::encode(&KeyedPayload {
            entries: self.entries.clone(),
        });
        let mut buf = Vec::with_capacity(KEYED_BLOCK_MAGIC.len() + 2 + payload.len());
        buf.extend_from_slice(KEYED_BLOCK_MAGIC);
        buf.push(KEYED_BLOCK_VERSION);
        buf.push(BITCODE_PREFIX);
        buf.extend_from_slice(&payload);
        buf
    }

    /// Parse the on-disk layout produced by [`KeyedBlockFile::to_bytes`].
    pub fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self, BlockError> {
        let corrupt = |reason: &str| BlockError::Format {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let rest = bytes
            .strip_prefix(KEYED_BLOCK_MAGIC)
            .ok_or_else(|| corrupt("missing block container magic"))?;
        let (version, rest) = rest
            .split_first()
            .ok_or_else(|| corrupt("truncated block container header"))?;
        if *version != KEYED_BLOCK_VERSION {
            return Err(corrupt(&format!(
                "block container version mismatch (expected {KEYED_BLOCK_VERSION}, found {version})"
            )));
        }
        let payload = rest
            .strip_prefix(&[BITCODE_PREFIX])
            .ok_or_else(|| corrupt("bitcode payload missing expected prefix"))?;
        let decoded: KeyedPayload = bitcode::decode(payload)
            .map_err(|err| corrupt(&format!("corrupt block payload: {err}")))?;
        Ok(Self {
            entries: decoded.entries,
        })
    }

    /// Write the container to `path`, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<(), BlockError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Read and decode the container stored at `path`.
    pub fn read(path: &Path) -> Result<Self, BlockError> {
        let bytes = fs::read(path)?;
        Self::from_bytes(path, &bytes)
    }
}

/// [`BlockFormat`] for [`KeyedBlockFile`] containers.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyedBlockFormat;

impl BlockFormat for KeyedBlockFormat {
    type Handle = KeyedBlockFile;

    fn open(&self, path: &Path) -> Result<Self::Handle, BlockError> {
        KeyedBlockFile::read(path)
    }
}

/// Validation callback requiring every key in `keys` to be present.
pub fn require_keys<'a>(
    keys: &'a [EntryKey],
) -> impl FnMut(&KeyedBlockFile) -> Result<(), BlockError> + 'a {
    move |file| match keys.iter().find(|key| !file.contains_key(key.as_str())) {
        Some(missing) => Err(BlockError::Configuration(format!(
            "block container missing required key '{missing}'"
        ))),
        None => Ok(()),
    }
}
