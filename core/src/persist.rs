use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::corpus::{CorpusHeader, CorpusReader, CorpusWriter};
use crate::dictionary::{Dictionary, DictionaryRecord};
use crate::error::{BuildError, BuildInputError, IndexError};
use crate::index::{Corpus, DocIndexMap, SparseVector};
use crate::normalizer::NormalizerConfig;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaFile {
    pub version: u32,
    pub created_at: String,
    pub num_docs: usize,
    pub num_terms: usize,
    pub max_terms: usize,
    pub normalizer: NormalizerConfig,
    #[serde(default)]
    pub failures: Vec<BuildInputError>,
}

/// Locations of one dataset's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub root: PathBuf,
    pub dictionary: PathBuf,
    pub corpus: PathBuf,
    pub doc_idxs: PathBuf,
    pub meta: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            dictionary: root.join("dictionary.bin"),
            corpus: root.join("corpus.mm"),
            doc_idxs: root.join("doc_idxs.json"),
            meta: root.join("meta.json"),
            root,
        }
    }

    /// `<data_dir>/<dataset_id>/...`
    pub fn for_dataset<P: AsRef<Path>>(data_dir: P, dataset_id: &str) -> Self {
        Self::new(data_dir.as_ref().join(dataset_id))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write through a `.tmp` sibling, then rename into place.
fn write_atomic<F>(path: &Path, write: F) -> Result<(), BuildError>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<(), BuildError>,
{
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    let mut out = BufWriter::new(File::create(&tmp)?);
    write(&mut out)?;
    out.flush()?;
    out.get_ref().sync_all()?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn open_artifact(artifact: &'static str, path: &Path) -> Result<BufReader<File>, IndexError> {
    match File::open(path) {
        Ok(f) => Ok(BufReader::new(f)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(IndexError::Missing { artifact, path: path.to_path_buf() }),
        Err(e) => Err(IndexError::Io(e)),
    }
}

pub fn save_dictionary(paths: &IndexPaths, dict: &Dictionary) -> Result<(), BuildError> {
    write_atomic(&paths.dictionary, |out| {
        bincode::serialize_into(out, &dict.to_record())?;
        Ok(())
    })
}

pub fn load_dictionary(paths: &IndexPaths) -> Result<Dictionary, IndexError> {
    let reader = open_artifact("dictionary", &paths.dictionary)?;
    let record: DictionaryRecord = bincode::deserialize_from(reader)?;
    Dictionary::from_record(record)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<(), BuildError> {
    write_atomic(&paths.meta, |out| {
        serde_json::to_writer_pretty(out, meta)?;
        Ok(())
    })
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile, IndexError> {
    let reader = open_artifact("meta", &paths.meta)?;
    let meta: MetaFile = serde_json::from_reader(reader)?;
    if meta.version != FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!("unsupported index version {}", meta.version)));
    }
    Ok(meta)
}

pub fn save_doc_idxs(paths: &IndexPaths, map: &DocIndexMap) -> Result<(), BuildError> {
    write_atomic(&paths.doc_idxs, |out| {
        serde_json::to_writer_pretty(out, map)?;
        Ok(())
    })
}

pub fn load_doc_idxs(paths: &IndexPaths) -> Result<DocIndexMap, IndexError> {
    let reader = open_artifact("doc_idxs", &paths.doc_idxs)?;
    Ok(serde_json::from_reader(reader)?)
}

/// Streams corpus rows and their document ids side by side. Nothing becomes
/// visible under the final artifact names until `commit`.
pub struct RowWriter {
    paths: IndexPaths,
    corpus: CorpusWriter,
    doc_idxs: DocIndexMap,
}

impl RowWriter {
    pub fn create(paths: &IndexPaths, cols: usize) -> Result<Self, BuildError> {
        create_dir_all(&paths.root)?;
        let corpus = CorpusWriter::create(tmp_path(&paths.corpus), cols)?;
        Ok(Self { paths: paths.clone(), corpus, doc_idxs: DocIndexMap::new() })
    }

    pub fn append(&mut self, doc_id: &str, vector: &SparseVector) -> Result<usize, BuildError> {
        let row = self.corpus.write_row(vector)?;
        let mapped = self.doc_idxs.push(doc_id);
        debug_assert_eq!(row, mapped);
        Ok(row)
    }

    pub fn rows(&self) -> usize { self.corpus.rows() }

    pub fn commit(self) -> Result<(CorpusHeader, DocIndexMap), BuildError> {
        let header = self.corpus.finish()?;
        fs::rename(tmp_path(&self.paths.corpus), &self.paths.corpus)?;
        save_doc_idxs(&self.paths, &self.doc_idxs)?;
        Ok((header, self.doc_idxs))
    }
}

/// Everything a query engine needs, validated for row alignment.
#[derive(Debug)]
pub struct LoadedIndex {
    pub dictionary: Dictionary,
    pub corpus: Corpus,
    pub doc_idxs: DocIndexMap,
    pub meta: MetaFile,
}

pub fn load_index(paths: &IndexPaths) -> Result<LoadedIndex, IndexError> {
    let meta = load_meta(paths)?;
    let dictionary = load_dictionary(paths)?;
    let doc_idxs = load_doc_idxs(paths)?;
    let reader = CorpusReader::open(&paths.corpus)?;
    let header = reader.header();
    if header.rows != doc_idxs.len() {
        return Err(IndexError::Corrupt(format!(
            "corpus has {} rows but doc index map has {} entries", header.rows, doc_idxs.len()
        )));
    }
    if header.rows != meta.num_docs {
        return Err(IndexError::Corrupt(format!(
            "corpus has {} rows but meta records {} documents", header.rows, meta.num_docs
        )));
    }
    let mut corpus: Corpus = Vec::with_capacity(header.rows);
    for row in reader {
        let row = row?;
        if let Some(&(tid, _)) = row.iter().find(|(tid, _)| dictionary.term(*tid).is_none()) {
            return Err(IndexError::Corrupt(format!("corpus row {} uses unknown term id {tid}", corpus.len())));
        }
        corpus.push(row);
    }
    Ok(LoadedIndex { dictionary, corpus, doc_idxs, meta })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn dataset_paths_are_scoped_by_id() {
        let p = IndexPaths::for_dataset("data/processed", "laws");
        assert_eq!(p.doc_idxs, PathBuf::from("data/processed/laws/doc_idxs.json"));
        assert_eq!(tmp_path(&p.corpus), PathBuf::from("data/processed/laws/corpus.mm.tmp"));
    }

    #[test]
    fn uncommitted_rows_are_invisible() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let mut w = RowWriter::create(&paths, 2).unwrap();
        w.append("a", &vec![(0, 1)]).unwrap();
        drop(w);
        assert!(!paths.corpus.exists());
        assert!(!paths.doc_idxs.exists());
    }

    #[test]
    fn missing_artifact_is_reported_by_name() {
        let dir = tempdir().unwrap();
        let err = load_dictionary(&IndexPaths::new(dir.path())).unwrap_err();
        assert!(matches!(err, IndexError::Missing { artifact: "dictionary", .. }));
    }
}
