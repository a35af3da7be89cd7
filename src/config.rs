use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::blocks::BlockPartitioner;
use crate::constants::project::{
    CONFIG_FILENAME, DATA_DIRNAME, DEFAULT_BLOCK_SIZE, DEFAULT_GPT_CHUNK_LENGTH, DEFAULT_GPT_SEED,
    DEFAULT_GPT_SEQ_LENGTH, DEFAULT_GPT_SPLIT,
};
use crate::errors::BlockError;

/// Preprocessing configuration stored as `config.json` inside a project directory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetroPreprocessingConfig {
    /// Root of the preprocessing project.
    pub project_dir: PathBuf,
    /// Dataset blend: either one prefix, or alternating `weight prefix` pairs.
    /// Prefixes are relative to `<project_dir>/data`.
    pub gpt_data_path: Vec<String>,
    /// Seed for GPT dataset construction.
    pub gpt_seed: u64,
    /// GPT sample length in tokens.
    pub gpt_seq_length: usize,
    /// Retrieval chunk length in tokens.
    pub gpt_chunk_length: usize,
    /// Train/valid/test split string (e.g. `98,2,0`).
    pub gpt_split: String,
    /// Optional cache directory for dataset index files.
    pub gpt_data_cache_path: Option<PathBuf>,
    /// Samples per block file.
    pub block_size: u64,
}

impl Default for RetroPreprocessingConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            gpt_data_path: Vec::new(),
            gpt_seed: DEFAULT_GPT_SEED,
            gpt_seq_length: DEFAULT_GPT_SEQ_LENGTH,
            gpt_chunk_length: DEFAULT_GPT_CHUNK_LENGTH,
            gpt_split: DEFAULT_GPT_SPLIT.to_string(),
            gpt_data_cache_path: None,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl RetroPreprocessingConfig {
    /// Load `<project_dir>/config.json`.
    ///
    /// `project_dir` in the returned config always reflects where it was loaded from.
    pub fn load(project_dir: impl AsRef<Path>) -> Result<Self, BlockError> {
        let project_dir = project_dir.as_ref();
        let raw = fs::read_to_string(config_path(project_dir))?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.project_dir = project_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Write this config to `<project_dir>/config.json`.
    pub fn save(&self) -> Result<PathBuf, BlockError> {
        fs::create_dir_all(&self.project_dir)?;
        let path = config_path(&self.project_dir);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }

    /// Check the values other modules rely on.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.block_size == 0 {
            return Err(BlockError::Configuration(
                "block_size must be greater than zero".into(),
            ));
        }
        num_chunks_per_sample(self.gpt_seq_length, self.gpt_chunk_length)?;
        Ok(())
    }

    /// Number of retrieval chunks per GPT sample.
    pub fn num_chunks_per_sample(&self) -> Result<usize, BlockError> {
        num_chunks_per_sample(self.gpt_seq_length, self.gpt_chunk_length)
    }

    /// Block partitioner for `n_samples` items stored under `<project_dir>/<subdir>`.
    pub fn block_partitioner(
        &self,
        subdir: impl AsRef<Path>,
        n_samples: u64,
    ) -> Result<BlockPartitioner, BlockError> {
        BlockPartitioner::new(self.project_dir.join(subdir), n_samples, self.block_size)
    }
}

/// Configuration handed to the external GPT dataset builder.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GptDatasetConfig {
    /// Whether the dataset is materialized on this rank.
    pub is_built_on_rank: bool,
    /// Seed for dataset shuffling.
    pub random_seed: u64,
    /// Sample length in tokens.
    pub sequence_length: usize,
    /// Blend with prefixes resolved under the project's data directory.
    pub blend: Vec<String>,
    /// Train/valid/test split string.
    pub split: String,
    /// Optional cache directory for dataset index files.
    pub path_to_cache: Option<PathBuf>,
    /// Whether samples carry their source document ids.
    pub return_document_ids: bool,
}

impl GptDatasetConfig {
    /// Derive the dataset config from a preprocessing config.
    pub fn from_preprocessing_config(
        config: &RetroPreprocessingConfig,
        is_built_on_rank: bool,
    ) -> Self {
        let data_dir = gpt_data_dir(&config.project_dir);
        Self {
            is_built_on_rank,
            random_seed: config.gpt_seed,
            sequence_length: config.gpt_seq_length,
            blend: resolve_blend_paths(&config.gpt_data_path, &data_dir),
            split: config.gpt_split.clone(),
            path_to_cache: config.gpt_data_cache_path.clone(),
            return_document_ids: true,
        }
    }
}

/// Join the prefix entries of a blend list onto `data_dir`.
///
/// Prefixes sit at every other position counting back from the last entry,
/// which covers both `[prefix]` and `[w1, p1, w2, p2, ...]`.
pub fn resolve_blend_paths(blend: &[String], data_dir: &Path) -> Vec<String> {
    let len = blend.len();
    blend
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            if (len - 1 - idx) % 2 == 0 {
                data_dir.join(entry).to_string_lossy().into_owned()
            } else {
                entry.clone()
            }
        })
        .collect()
}

/// Config copy stored within a project directory.
pub fn config_path(project_dir: impl AsRef<Path>) -> PathBuf {
    project_dir.as_ref().join(CONFIG_FILENAME)
}

/// Directory holding the GPT token datasets of a project.
pub fn gpt_data_dir(project_dir: impl AsRef<Path>) -> PathBuf {
    project_dir.as_ref().join(DATA_DIRNAME)
}

/// `sample_length / chunk_length`; the division must be exact.
pub fn num_chunks_per_sample(sample_length: usize, chunk_length: usize) -> Result<usize, BlockError> {
    if chunk_length == 0 || sample_length % chunk_length != 0 {
        return Err(BlockError::Configuration(format!(
            "sample length {sample_length} is not a multiple of chunk length {chunk_length}"
        )));
    }
    Ok(sample_length / chunk_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn chunks_per_sample_requires_exact_division() {
        assert_eq!(num_chunks_per_sample(2048, 64).unwrap(), 32);
        assert!(num_chunks_per_sample(2048, 100).is_err());
        assert!(num_chunks_per_sample(2048, 0).is_err());
    }

    #[test]
    fn blend_prefixes_are_resolved_under_data_dir() {
        let data_dir = Path::new("/proj/data");
        let single = resolve_blend_paths(&["wiki".to_string()], data_dir);
        assert_eq!(single, vec!["/proj/data/wiki".to_string()]);

        let weighted = resolve_blend_paths(
            &[
                "0.3".to_string(),
                "wiki".to_string(),
                "0.7".to_string(),
                "books".to_string(),
            ],
            data_dir,
        );
        assert_eq!(
            weighted,
            vec![
                "0.3".to_string(),
                "/proj/data/wiki".to_string(),
                "0.7".to_string(),
                "/proj/data/books".to_string(),
            ]
        );
        assert!(resolve_blend_paths(&[], data_dir).is_empty());
    }

    #[test]
    fn config_round_trips_through_project_dir() {
        let temp = tempdir().unwrap();
        let config = RetroPreprocessingConfig {
            project_dir: temp.path().join("project"),
            gpt_data_path: vec!["1".into(), "wiki".into()],
            block_size: 500,
            ..RetroPreprocessingConfig::default()
        };
        let path = config.save().unwrap();
        assert_eq!(path, config_path(temp.path().join("project")));

        let loaded = RetroPreprocessingConfig::load(temp.path().join("project")).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.num_chunks_per_sample().unwrap(), 32);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let temp = tempdir().unwrap();
        fs::write(config_path(temp.path()), r#"{"block_size": 10}"#).unwrap();
        let loaded = RetroPreprocessingConfig::load(temp.path()).unwrap();
        assert_eq!(loaded.block_size, 10);
        assert_eq!(loaded.gpt_seed, DEFAULT_GPT_SEED);
        assert_eq!(loaded.project_dir, temp.path());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let temp = tempdir().unwrap();
        fs::write(config_path(temp.path()), r#"{"block_size": 0}"#).unwrap();
        assert!(matches!(
            RetroPreprocessingConfig::load(temp.path()),
            Err(BlockError::Configuration(_))
        ));
        fs::write(config_path(temp.path()), "not json").unwrap();
        assert!(matches!(
            RetroPreprocessingConfig::load(temp.path()),
            Err(BlockError::Json(_))
        ));
    }

    #[test]
    fn dataset_config_derives_from_preprocessing_config() {
        let config = RetroPreprocessingConfig {
            project_dir: PathBuf::from("/proj"),
            gpt_data_path: vec!["wiki".into()],
            gpt_data_cache_path: Some(PathBuf::from("/cache")),
            ..RetroPreprocessingConfig::default()
        };
        let dataset = GptDatasetConfig::from_preprocessing_config(&config, true);
        assert!(dataset.is_built_on_rank);
        assert!(dataset.return_document_ids);
        assert_eq!(dataset.blend, vec!["/proj/data/wiki".to_string()]);
        assert_eq!(dataset.sequence_length, DEFAULT_GPT_SEQ_LENGTH);
        assert_eq!(dataset.path_to_cache, Some(PathBuf::from("/cache")));
    }

    #[test]
    fn partitioner_lives_under_project_dir() {
        let config = RetroPreprocessingConfig {
            project_dir: PathBuf::from("/proj"),
            block_size: 100,
            ..RetroPreprocessingConfig::default()
        };
        let partition = config.block_partitioner("query/neighbors", 250).unwrap();
        assert_eq!(partition.dir(), Path::new("/proj/query/neighbors"));
        assert_eq!(partition.block_count(), 3);
    }
}
