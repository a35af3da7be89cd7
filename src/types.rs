/// Position of a sample within the preprocessed range `[0, n_samples)`.
/// Example: `1_250_000`
pub type SampleIndex = u64;
/// Half-open `(start_idx, end_idx)` range covered by one block file.
/// Example: `(100, 200)`
pub type BlockRange = (SampleIndex, SampleIndex);
/// Data-parallel rank identifier.
/// Examples: `0` (leader), `3`
pub type Rank = usize;
/// Dataset path prefix as handed to the indexed dataset (without extension).
/// Example: `wiki/wiki-text_document`
pub type DataPrefix = String;
/// Token id produced by the external tokenizer.
/// Example: `50256`
pub type TokenId = u32;
/// Key of an entry inside a keyed block container.
/// Examples: `data`, `doc_ids`
pub type EntryKey = String;
