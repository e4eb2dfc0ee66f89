//! Offline index build: dictionary pass, then encoding pass, then artifacts.

use std::fs;
use std::io;
use std::time::Instant;

use crate::corpus::CorpusHeader;
use crate::dictionary::{Dictionary, DictionaryBuilder, PruneParams, PruneReport};
use crate::document::DocumentSet;
use crate::encoder::CorpusEncoder;
use crate::error::{BuildError, BuildInputError};
use crate::normalizer::Normalizer;
use crate::persist::{save_dictionary, save_meta, IndexPaths, MetaFile, RowWriter, FORMAT_VERSION};

/// What to do with a document that cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Record it, leave it out of the index, keep going.
    #[default]
    Skip,
    /// Stop the whole build.
    Abort,
}

#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub max_terms: usize,
    pub prune: PruneParams,
    pub progress_every: usize,
    pub failure_policy: FailurePolicy,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_terms: 2_000_000,
            prune: PruneParams::default(),
            progress_every: 1000,
            failure_policy: FailurePolicy::Skip,
        }
    }
}

#[derive(Debug)]
pub struct BuildReport {
    pub num_docs: usize,
    pub num_terms: usize,
    pub corpus: CorpusHeader,
    pub prunes: Vec<PruneReport>,
    pub failures: Vec<BuildInputError>,
}

fn record_failure(
    err: BuildInputError,
    policy: FailurePolicy,
    failures: &mut Vec<BuildInputError>,
) -> Result<(), BuildError> {
    if policy == FailurePolicy::Abort {
        return Err(err.into());
    }
    tracing::warn!(doc_id = %err.doc_id, reason = %err.reason, "skipping document");
    failures.push(err);
    Ok(())
}

/// Single pass over `docs` accumulating the vocabulary, pruning whenever it
/// grows past `config.max_terms`.
pub fn extract_dictionary<N: Normalizer + ?Sized>(
    docs: &DocumentSet,
    normalizer: &N,
    config: &BuildConfig,
) -> Result<(Dictionary, Vec<PruneReport>, Vec<BuildInputError>), BuildError> {
    tracing::info!(docs = docs.len(), max_terms = config.max_terms, "extracting dictionary from corpus");
    let start = Instant::now();
    let mut builder = DictionaryBuilder::new(config.max_terms, config.prune);
    let mut failures = Vec::new();
    for entry in docs {
        match entry.read() {
            Ok(text) => builder.add_document(&normalizer.normalize(&text)),
            Err(err) => record_failure(err, config.failure_policy, &mut failures)?,
        }
    }
    let prunes = builder.prunes().to_vec();
    let dict = builder.finish();
    tracing::info!(terms = dict.len(), prunes = prunes.len(), elapsed_s = start.elapsed().as_secs_f64(), "dictionary extracted");
    Ok((dict, prunes, failures))
}

/// Build all artifacts for `docs` under `paths`.
///
/// Any previous `meta.json` is removed first, so an interrupted build leaves an
/// index that fails to load instead of one that mixes old and new artifacts.
pub fn build_index<N: Normalizer + ?Sized>(
    docs: &DocumentSet,
    normalizer: &N,
    config: &BuildConfig,
    paths: &IndexPaths,
) -> Result<BuildReport, BuildError> {
    match fs::remove_file(&paths.meta) {
        Ok(()) => tracing::info!(meta = %paths.meta.display(), "removed previous index metadata"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }

    let (dict, prunes, mut failures) = extract_dictionary(docs, normalizer, config)?;
    save_dictionary(paths, &dict)?;

    tracing::info!("building corpus term-document matrix");
    let readable = docs.without(&failures);
    let mut rows = RowWriter::create(paths, dict.id_bound() as usize)?;
    let encoder = CorpusEncoder::new(&readable, &dict, normalizer).with_progress_every(config.progress_every);
    for item in encoder {
        match item {
            Ok(encoded) => {
                rows.append(&encoded.doc_id, &encoded.vector)?;
            }
            Err(err) => record_failure(err, config.failure_policy, &mut failures)?,
        }
    }
    let (corpus, doc_idxs) = rows.commit()?;

    let meta = MetaFile {
        version: FORMAT_VERSION,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)?,
        num_docs: doc_idxs.len(),
        num_terms: dict.len(),
        max_terms: config.max_terms,
        normalizer: normalizer.config().clone(),
        failures: failures.clone(),
    };
    save_meta(paths, &meta)?;

    if !failures.is_empty() {
        tracing::warn!(failed = failures.len(), "some documents were left out of the index; see meta.json");
    }
    tracing::info!(root = %paths.root.display(), rows = corpus.rows, terms = dict.len(), "index build complete");
    Ok(BuildReport { num_docs: doc_idxs.len(), num_terms: dict.len(), corpus, prunes, failures })
}
