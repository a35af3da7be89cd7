//! Glue for building fine-tuning token datasets from external collaborators.
//!
//! Indexed datasets, blend planning, and weighted blending all live outside
//! this crate; the traits below describe what the glue needs from them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::constants::dataset::DEFAULT_MAX_NUM_SHOT;
use crate::errors::BlockError;
use crate::types::{DataPrefix, TokenId};

/// Integer-indexed dataset of fixed-length token sequences.
pub trait TokenDataset {
    /// Number of samples.
    fn len(&self) -> usize;
    /// Token sequence of sample `idx`.
    fn get(&self, idx: usize) -> Result<Vec<TokenId>, BlockError>;

    /// True when the dataset has no samples.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts token ids back to text.
pub trait Detokenizer {
    /// Decode `tokens` to text.
    fn detokenize(&self, tokens: &[TokenId]) -> Result<String, BlockError>;
}

/// Token dataset viewed as text.
pub struct TextDataset<D, T> {
    dataset: D,
    tokenizer: T,
}

impl<D: TokenDataset, T: Detokenizer> TextDataset<D, T> {
    /// Wrap `dataset`, decoding samples with `tokenizer`.
    pub fn new(dataset: D, tokenizer: T) -> Self {
        Self { dataset, tokenizer }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    /// True when the wrapped dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    /// Text of sample `idx`.
    pub fn get(&self, idx: usize) -> Result<String, BlockError> {
        let tokens = self.dataset.get(idx)?;
        self.tokenizer.detokenize(&tokens)
    }
}

/// Dataset partitions produced by the builders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DatasetSplit {
    /// Training split.
    Train,
    /// Validation split.
    Valid,
    /// Test split.
    Test,
}

impl DatasetSplit {
    /// Canonical split iteration order.
    pub const ALL: [DatasetSplit; 3] = [DatasetSplit::Train, DatasetSplit::Valid, DatasetSplit::Test];

    /// Split name as used by processed dataset files.
    pub fn name(self) -> &'static str {
        match self {
            DatasetSplit::Train => "train",
            DatasetSplit::Valid => "valid",
            DatasetSplit::Test => "test",
        }
    }

    fn position(self) -> usize {
        match self {
            DatasetSplit::Train => 0,
            DatasetSplit::Valid => 1,
            DatasetSplit::Test => 2,
        }
    }
}

/// Per-split options handed to a [`SplitDatasetProvider`].
#[derive(Clone, Debug)]
pub struct SplitOptions<'a> {
    /// Sample budget for this split.
    pub num_samples: u64,
    /// Sequence length in tokens.
    pub seq_length: usize,
    /// Dataset seed.
    pub seed: u64,
    /// In-context few-shot example file for this prefix.
    pub fewshot_file: Option<&'a Path>,
    /// Maximum number of few-shot examples.
    pub max_num_shot: usize,
    /// Always use exactly `max_num_shot` examples.
    pub fixed_shot: bool,
    /// Model name forwarded to prompt formatting.
    pub model_name: Option<&'a str>,
}

/// Builds the dataset for one prefix and split (the external indexed dataset).
pub trait SplitDatasetProvider {
    /// Dataset type produced.
    type Dataset;

    /// Build `split` of `prefix`; `None` when that split has no data.
    fn build(
        &self,
        prefix: &str,
        split: DatasetSplit,
        options: &SplitOptions<'_>,
    ) -> Result<Option<Self::Dataset>, BlockError>;
}

/// Prefixes, weights, and per-prefix budgets derived from a weighted blend list.
#[derive(Clone, Debug, PartialEq)]
pub struct BlendPlan {
    /// Dataset prefixes in blend order.
    pub prefixes: Vec<DataPrefix>,
    /// Normalized weight per prefix.
    pub weights: Vec<f64>,
    /// Per-prefix budgets, one entry per requested budget.
    pub num_samples: Vec<Vec<u64>>,
}

/// Turns `[w1, p1, w2, p2, ...]` plus budgets into a [`BlendPlan`].
pub trait BlendPlanner {
    /// Plan a blend of `data_prefix` for each budget in `budgets`.
    fn plan(&self, data_prefix: &[String], budgets: &[u64]) -> Result<BlendPlan, BlockError>;
}

/// Samples from several datasets proportionally to their weights.
pub trait DatasetBlender<D> {
    /// Blend `datasets` with aligned `weights`.
    fn blend(&self, datasets: Vec<D>, weights: &[f64]) -> Result<D, BlockError>;
}

/// Train, validation, and test datasets; any may be absent.
#[derive(Debug)]
pub struct TrainValidTest<D> {
    /// Training dataset.
    pub train: Option<D>,
    /// Validation dataset.
    pub valid: Option<D>,
    /// Test dataset.
    pub test: Option<D>,
}

impl<D> Default for TrainValidTest<D> {
    fn default() -> Self {
        Self {
            train: None,
            valid: None,
            test: None,
        }
    }
}

impl<D> TrainValidTest<D> {
    /// Dataset for `split`.
    pub fn get(&self, split: DatasetSplit) -> Option<&D> {
        match split {
            DatasetSplit::Train => self.train.as_ref(),
            DatasetSplit::Valid => self.valid.as_ref(),
            DatasetSplit::Test => self.test.as_ref(),
        }
    }

    fn slot(&mut self, split: DatasetSplit) -> &mut Option<D> {
        match split {
            DatasetSplit::Train => &mut self.train,
            DatasetSplit::Valid => &mut self.valid,
            DatasetSplit::Test => &mut self.test,
        }
    }
}

/// Inputs for [`build_train_valid_test_datasets`].
#[derive(Clone, Debug)]
pub struct DatasetRequest {
    /// Shared blend list split into train/valid/test; empty to use per-split prefixes.
    pub data_prefix: Vec<String>,
    /// Train blend list, used only when `data_prefix` is empty.
    pub train_data_prefix: Option<Vec<String>>,
    /// Validation blend list, used only when `data_prefix` is empty.
    pub valid_data_prefix: Option<Vec<String>>,
    /// Test blend list, used only when `data_prefix` is empty.
    pub test_data_prefix: Option<Vec<String>>,
    /// Sample budgets for train, valid, and test.
    pub train_valid_test_num_samples: [u64; 3],
    /// Sequence length in tokens.
    pub seq_length: usize,
    /// Dataset seed.
    pub seed: u64,
    /// Few-shot example file per prefix (shared `data_prefix` only).
    pub fewshot_files: Option<HashMap<DataPrefix, PathBuf>>,
    /// Maximum number of few-shot examples.
    pub max_num_shot: usize,
    /// Always use exactly `max_num_shot` examples.
    pub fixed_shot: bool,
    /// Model name forwarded to prompt formatting.
    pub model_name: Option<String>,
}

impl Default for DatasetRequest {
    fn default() -> Self {
        Self {
            data_prefix: Vec::new(),
            train_data_prefix: None,
            valid_data_prefix: None,
            test_data_prefix: None,
            train_valid_test_num_samples: [0; 3],
            seq_length: 0,
            seed: 0,
            fewshot_files: None,
            max_num_shot: DEFAULT_MAX_NUM_SHOT,
            fixed_shot: false,
            model_name: None,
        }
    }
}

impl DatasetRequest {
    fn fewshot_file_for(&self, prefix: &str) -> Result<Option<&Path>, BlockError> {
        match &self.fewshot_files {
            None => Ok(None),
            Some(files) => files
                .get(prefix)
                .map(|path| Some(path.as_path()))
                .ok_or_else(|| {
                    BlockError::Dataset(format!("no few-shot file configured for prefix '{prefix}'"))
                }),
        }
    }

    fn options<'a>(&'a self, num_samples: u64, fewshot_file: Option<&'a Path>) -> SplitOptions<'a> {
        SplitOptions {
            num_samples,
            seq_length: self.seq_length,
            seed: self.seed,
            fewshot_file,
            max_num_shot: self.max_num_shot,
            fixed_shot: self.fixed_shot,
            model_name: self.model_name.as_deref(),
        }
    }
}

/// Build train/valid/test datasets, blending across prefixes when several are given.
pub fn build_train_valid_test_datasets<P, L, B>(
    request: &DatasetRequest,
    provider: &P,
    planner: &L,
    blender: &B,
) -> Result<TrainValidTest<P::Dataset>, BlockError>
where
    P: SplitDatasetProvider,
    L: BlendPlanner + ?Sized,
    B: DatasetBlender<P::Dataset> + ?Sized,
{
    if !request.data_prefix.is_empty() {
        info!("single data path provided for train, valid & test");
        if request.data_prefix.len() == 1 {
            let prefix = &request.data_prefix[0];
            let fewshot_file = request.fewshot_file_for(prefix)?;
            return build_prefix_splits(
                request,
                provider,
                prefix,
                &request.train_valid_test_num_samples,
                fewshot_file,
            );
        }

        let plan = planner.plan(&request.data_prefix, &request.train_valid_test_num_samples)?;
        check_plan(&plan, 3)?;
        let mut per_split: [Vec<(P::Dataset, f64)>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for ((prefix, weight), budgets) in plan
            .prefixes
            .iter()
            .zip(&plan.weights)
            .zip(&plan.num_samples)
        {
            let fewshot_file = request.fewshot_file_for(prefix)?;
            let mut built = build_prefix_splits(request, provider, prefix, budgets, fewshot_file)?;
            for split in DatasetSplit::ALL {
                if let Some(dataset) = built.slot(split).take() {
                    per_split[split.position()].push((dataset, *weight));
                }
            }
        }

        let mut blended = TrainValidTest::default();
        for (split, members) in DatasetSplit::ALL.into_iter().zip(per_split) {
            *blended.slot(split) = blend_members(blender, members)?;
        }
        return Ok(blended);
    }

    info!("separate data paths provided for train, valid & test; split string ignored");
    let mut datasets = TrainValidTest::default();
    for split in DatasetSplit::ALL {
        let prefixes = match split {
            DatasetSplit::Train => request.train_data_prefix.as_deref(),
            DatasetSplit::Valid => request.valid_data_prefix.as_deref(),
            DatasetSplit::Test => request.test_data_prefix.as_deref(),
        };
        if let Some(prefixes) = prefixes {
            let num_samples = request.train_valid_test_num_samples[split.position()];
            *datasets.slot(split) =
                build_dataset(request, provider, planner, blender, split, prefixes, num_samples)?;
        }
    }
    Ok(datasets)
}

/// Build one split from a blend list: a single prefix directly, several blended.
pub fn build_dataset<P, L, B>(
    request: &DatasetRequest,
    provider: &P,
    planner: &L,
    blender: &B,
    split: DatasetSplit,
    data_prefix: &[String],
    num_samples: u64,
) -> Result<Option<P::Dataset>, BlockError>
where
    P: SplitDatasetProvider,
    L: BlendPlanner + ?Sized,
    B: DatasetBlender<P::Dataset> + ?Sized,
{
    match data_prefix {
        [] => Ok(None),
        [prefix] => provider.build(prefix, split, &request.options(num_samples, None)),
        _ => {
            let plan = planner.plan(data_prefix, &[num_samples])?;
            check_plan(&plan, 1)?;
            let mut members = Vec::with_capacity(plan.prefixes.len());
            for ((prefix, weight), budgets) in plan
                .prefixes
                .iter()
                .zip(&plan.weights)
                .zip(&plan.num_samples)
            {
                let options = request.options(budgets[0], None);
                if let Some(dataset) = provider.build(prefix, split, &options)? {
                    members.push((dataset, *weight));
                }
            }
            blend_members(blender, members)
        }
    }
}

fn build_prefix_splits<P>(
    request: &DatasetRequest,
    provider: &P,
    prefix: &str,
    budgets: &[u64],
    fewshot_file: Option<&Path>,
) -> Result<TrainValidTest<P::Dataset>, BlockError>
where
    P: SplitDatasetProvider,
{
    let mut built = TrainValidTest::default();
    for split in DatasetSplit::ALL {
        let num_samples = budgets.get(split.position()).copied().unwrap_or(0);
        let options = request.options(num_samples, fewshot_file);
        *built.slot(split) = provider.build(prefix, split, &options)?;
    }
    Ok(built)
}

// Datasets that came back empty are dropped together with their weight.
fn blend_members<D, B>(blender: &B, members: Vec<(D, f64)>) -> Result<Option<D>, BlockError>
where
    B: DatasetBlender<D> + ?Sized,
{
    if members.is_empty() {
        return Ok(None);
    }
    let (datasets, weights): (Vec<D>, Vec<f64>) = members.into_iter().unzip();
    blender.blend(datasets, &weights).map(Some)
}

fn check_plan(plan: &BlendPlan, budgets: usize) -> Result<(), BlockError> {
    let n = plan.prefixes.len();
    if plan.weights.len() != n || plan.num_samples.len() != n {
        return Err(BlockError::Dataset(format!(
            "blend plan is misaligned: {n} prefixes, {} weights, {} budgets",
            plan.weights.len(),
            plan.num_samples.len()
        )));
    }
    if let Some(short) = plan.num_samples.iter().find(|b| b.len() < budgets) {
        return Err(BlockError::Dataset(format!(
            "blend plan budget has {} entries, expected {budgets}",
            short.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecDataset(Vec<Vec<TokenId>>);

    impl TokenDataset for VecDataset {
        fn len(&self) -> usize {
            self.0.len()
        }

        fn get(&self, idx: usize) -> Result<Vec<TokenId>, BlockError> {
            self.0
                .get(idx)
                .cloned()
                .ok_or_else(|| BlockError::Dataset(format!("index {idx} out of range")))
        }
    }

    struct LetterTokenizer;

    impl Detokenizer for LetterTokenizer {
        fn detokenize(&self, tokens: &[TokenId]) -> Result<String, BlockError> {
            Ok(tokens
                .iter()
                .map(|t| char::from(b'a' + (*t % 26) as u8))
                .collect())
        }
    }

    #[test]
    fn text_dataset_detokenizes_samples() {
        let text = TextDataset::new(VecDataset(vec![vec![0, 1, 2], vec![7]]), LetterTokenizer);
        assert_eq!(text.len(), 2);
        assert_eq!(text.get(0).unwrap(), "abc");
        assert_eq!(text.get(1).unwrap(), "h");
        assert!(text.get(2).is_err());
    }

    #[test]
    fn split_names_match_processed_files() {
        let names: Vec<_> = DatasetSplit::ALL.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["train", "valid", "test"]);
    }

    #[test]
    fn fewshot_lookup_requires_mapping_when_configured() {
        let mut request = DatasetRequest::default();
        assert_eq!(request.fewshot_file_for("wiki").unwrap(), None);

        let mut files = HashMap::new();
        files.insert("wiki".to_string(), PathBuf::from("/shots/wiki.json"));
        request.fewshot_files = Some(files);
        assert_eq!(
            request.fewshot_file_for("wiki").unwrap(),
            Some(Path::new("/shots/wiki.json"))
        );
        assert!(matches!(
            request.fewshot_file_for("books"),
            Err(BlockError::Dataset(_))
        ));
    }

    #[test]
    fn misaligned_plan_is_rejected() {
        let plan = BlendPlan {
            prefixes: vec!["a".into(), "b".into()],
            weights: vec![1.0],
            num_samples: vec![vec![1], vec![1]],
        };
        assert!(check_plan(&plan, 1).is_err());

        let short = BlendPlan {
            prefixes: vec!["a".into()],
            weights: vec![1.0],
            num_samples: vec![vec![1]],
        };
        assert!(check_plan(&short, 3).is_err());
        assert!(check_plan(&short, 1).is_ok());
    }
}
