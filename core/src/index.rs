use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

use crate::error::IndexError;

pub type TermId = u32;

/// Sparse bag-of-words row: `(term_id, count)` pairs sorted by `term_id`.
pub type SparseVector = Vec<(TermId, u32)>;

/// Ordered rows of the persisted corpus, one per indexed document.
pub type Corpus = Vec<SparseVector>;

/// Row index -> external document id, in corpus row order.
///
/// Serialized as `{"0": "<doc_id>", "1": "<doc_id>", ...}` with keys emitted
/// in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocIndexMap {
    ids: Vec<String>,
}

impl DocIndexMap {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, doc_id: impl Into<String>) -> usize {
        self.ids.push(doc_id.into());
        self.ids.len() - 1
    }

    pub fn get(&self, row: usize) -> Option<&str> {
        self.ids.get(row).map(String::as_str)
    }

    pub fn len(&self) -> usize { self.ids.len() }

    pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// Rebuild from the on-disk string-keyed form. Keys must be exactly `0..N`.
    pub fn from_string_keys(raw: HashMap<String, String>) -> Result<Self, IndexError> {
        let mut slots: Vec<Option<String>> = vec![None; raw.len()];
        for (key, doc_id) in raw {
            let row: usize = key
                .parse()
                .map_err(|_| IndexError::Corrupt(format!("doc index key {key:?} is not a row number")))?;
            let slot = slots
                .get_mut(row)
                .ok_or_else(|| IndexError::Corrupt(format!("doc index row {row} out of range")))?;
            *slot = Some(doc_id);
        }
        let ids = slots
            .into_iter()
            .enumerate()
            .map(|(row, id)| id.ok_or_else(|| IndexError::Corrupt(format!("doc index row {row} missing"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ids })
    }
}

impl Serialize for DocIndexMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.ids.len()))?;
        for (row, doc_id) in self.ids.iter().enumerate() {
            map.serialize_entry(&row.to_string(), doc_id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for DocIndexMap {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, String>::deserialize(deserializer)?;
        Self::from_string_keys(raw).map_err(serde::de::Error::custom)
    }
}

/// Count tokens into a sparse vector, keeping only ids `lookup` resolves.
pub fn bag_of_words<'a, I, F>(tokens: I, mut lookup: F) -> SparseVector
where
    I: IntoIterator<Item = &'a str>,
    F: FnMut(&str) -> Option<TermId>,
{
    let mut counts: HashMap<TermId, u32> = HashMap::new();
    for token in tokens {
        if let Some(tid) = lookup(token) {
            *counts.entry(tid).or_insert(0) += 1;
        }
    }
    let mut vector: SparseVector = counts.into_iter().collect();
    vector.sort_unstable_by_key(|(tid, _)| *tid);
    vector
}
