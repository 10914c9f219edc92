use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One selectable line: its stable position in the original corpus, its text,
/// and an opaque payload carried through to the presentation layer untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub index: i64,
    pub value: String,
    pub data: Option<serde_json::Value>,
}

impl Entry {
    pub fn new(index: i64, value: &str) -> Self {
        Self::from_owned(index, value.to_string(), None)
    }

    pub fn from_owned(index: i64, value: String, data: Option<serde_json::Value>) -> Self {
        Self { index, value, data }
    }
}

/// Builds the shared corpus from raw lines, dropping entries that are blank
/// after trimming. Indices refer to positions in the kept corpus.
pub fn corpus_from_lines<I, S>(lines: I) -> Vec<Arc<Entry>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .filter(|line| !line.as_ref().trim().is_empty())
        .enumerate()
        .map(|(index, line)| Arc::new(Entry::new(index as i64, line.as_ref())))
        .collect()
}

/// Alternating unmatched/matched fragments of an entry value, in order.
/// Concatenating `unmatched + matched` across all partitions restores the
/// original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub unmatched: String,
    pub matched: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub entry: Arc<Entry>,
    pub partitions: Vec<Partition>,
}

impl Match {
    pub fn new(entry: Arc<Entry>, partitions: Vec<Partition>) -> Self {
        Self { entry, partitions }
    }
}
