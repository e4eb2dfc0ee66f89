use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{BuildError, BuildInputError};

/// A document on disk: its id is the file name with the extension removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentEntry {
    pub id: String,
    pub path: PathBuf,
}

impl DocumentEntry {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { id: id.into(), path: path.into() }
    }

    pub fn read(&self) -> Result<String, BuildInputError> {
        fs::read_to_string(&self.path).map_err(|e| BuildInputError {
            doc_id: self.id.clone(),
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }
}

/// The ordered list of documents a build runs over. Order defines corpus rows.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    entries: Vec<DocumentEntry>,
}

impl DocumentSet {
    pub fn from_entries(entries: Vec<DocumentEntry>) -> Self { Self { entries } }

    /// All `*.txt` files directly inside `dir`, sorted by file name.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, BuildError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(BuildError::DocsDir { path: dir.to_path_buf(), reason: "not a directory".into() });
        }
        let mut entries = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| BuildError::DocsDir { path: dir.to_path_buf(), reason: e.to_string() })?;
            let p = entry.path();
            if !entry.file_type().is_file() { continue; }
            if p.extension().and_then(|s| s.to_str()) != Some("txt") { continue; }
            if let Some(stem) = p.file_stem().and_then(|s| s.to_str()) {
                entries.push(DocumentEntry::new(stem, p));
            }
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> std::slice::Iter<'_, DocumentEntry> { self.entries.iter() }

    /// A copy without the listed document ids.
    pub fn without(&self, excluded: &[BuildInputError]) -> Self {
        let excluded: HashSet<&str> = excluded.iter().map(|f| f.doc_id.as_str()).collect();
        let entries = self
            .entries
            .iter()
            .filter(|e| !excluded.contains(e.id.as_str()))
            .cloned()
            .collect();
        Self { entries }
    }
}

impl<'a> IntoIterator for &'a DocumentSet {
    type Item = &'a DocumentEntry;
    type IntoIter = std::slice::Iter<'a, DocumentEntry>;
    fn into_iter(self) -> Self::IntoIter { self.entries.iter() }
}
