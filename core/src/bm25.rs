//! Okapi BM25 over the persisted corpus.
//!
//! Statistics are computed once at load. Queries do a full linear scan of the
//! corpus; ranking is score descending, then corpus row ascending.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::dictionary::Dictionary;
use crate::engine::{EngineConfig, RetrievalEngine, ScoredDoc};
use crate::error::IndexError;
use crate::index::{Corpus, DocIndexMap, SparseVector, TermId};
use crate::normalizer::Normalizer;
use crate::persist::{load_index, IndexPaths};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.5, b: 0.75 }
    }
}

pub struct Bm25Engine {
    normalizer: Box<dyn Normalizer>,
    dictionary: Dictionary,
    corpus: Corpus,
    doc_idxs: DocIndexMap,
    doc_lengths: Vec<f32>,
    avgdl: f32,
    idf: HashMap<TermId, f32>,
    params: Bm25Params,
}

impl Bm25Engine {
    pub fn from_parts(
        dictionary: Dictionary,
        corpus: Corpus,
        doc_idxs: DocIndexMap,
        normalizer: Box<dyn Normalizer>,
        params: Bm25Params,
    ) -> Result<Self, IndexError> {
        if corpus.len() != doc_idxs.len() {
            return Err(IndexError::Corrupt(format!(
                "corpus has {} rows but doc index map has {} entries", corpus.len(), doc_idxs.len()
            )));
        }
        let doc_lengths: Vec<f32> = corpus
            .iter()
            .map(|row| row.iter().map(|&(_, c)| c as f32).sum())
            .collect();
        let n = corpus.len() as f32;
        let avgdl = if corpus.is_empty() { 0.0 } else { doc_lengths.iter().sum::<f32>() / n };

        let mut dfs: HashMap<TermId, u32> = HashMap::new();
        for row in &corpus {
            for &(tid, _) in row {
                *dfs.entry(tid).or_insert(0) += 1;
            }
        }
        let idf = dfs
            .into_iter()
            .map(|(tid, df)| {
                let df = df as f32;
                (tid, (1.0 + (n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        Ok(Self { normalizer, dictionary, corpus, doc_idxs, doc_lengths, avgdl, idf, params })
    }

    pub fn avgdl(&self) -> f32 { self.avgdl }

    /// Zero for terms that occur in no corpus row.
    pub fn idf(&self, tid: TermId) -> f32 { self.idf.get(&tid).copied().unwrap_or(0.0) }

    pub fn dictionary(&self) -> &Dictionary { &self.dictionary }

    /// Bag-of-words of the query against the loaded dictionary.
    pub fn query_vector(&self, query: &str) -> SparseVector {
        let tokens = self.normalizer.normalize(query);
        let vector = self.dictionary.doc2bow(&tokens);
        tracing::debug!(tokens = tokens.len(), in_vocab = vector.len(), "query vectorized");
        vector
    }

    fn score_row(&self, row: usize, query: &SparseVector) -> f32 {
        let doc = &self.corpus[row];
        let Bm25Params { k1, b } = self.params;
        let norm = if self.avgdl > 0.0 { self.doc_lengths[row] / self.avgdl } else { 0.0 };
        let mut score = 0.0;
        for &(tid, qtf) in query {
            let Ok(pos) = doc.binary_search_by_key(&tid, |&(t, _)| t) else { continue };
            let tf = doc[pos].1 as f32;
            score += qtf as f32 * self.idf(tid) * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * norm));
        }
        score
    }

    /// One score per corpus row, in row order.
    pub fn scores(&self, query: &SparseVector) -> Vec<f32> {
        (0..self.corpus.len()).map(|row| self.score_row(row, query)).collect()
    }
}

/// Row indices of the `k` best scores: score descending, row ascending on ties.
pub fn rank(scores: &[f32], k: usize) -> Vec<usize> {
    let k = k.min(scores.len());
    if k == 0 {
        return Vec::new();
    }
    let cmp = |a: &usize, b: &usize| scores[*b].total_cmp(&scores[*a]).then_with(|| a.cmp(b));
    let mut rows: Vec<usize> = (0..scores.len()).collect();
    if k < rows.len() {
        rows.select_nth_unstable_by(k - 1, cmp);
        rows.truncate(k);
    }
    rows.sort_unstable_by(cmp);
    rows
}

impl RetrievalEngine for Bm25Engine {
    fn load(paths: &IndexPaths, normalizer: Box<dyn Normalizer>, config: &EngineConfig) -> Result<Self, IndexError> {
        let index = load_index(paths)?;
        if &index.meta.normalizer != normalizer.config() {
            return Err(IndexError::ConfigMismatch {
                built: Box::new(index.meta.normalizer),
                query: Box::new(normalizer.config().clone()),
            });
        }
        let engine = Self::from_parts(index.dictionary, index.corpus, index.doc_idxs, normalizer, config.bm25)?;
        tracing::info!(
            root = %paths.root.display(),
            rows = engine.num_docs(),
            terms = engine.dictionary.len(),
            avgdl = engine.avgdl,
            "BM25 engine loaded"
        );
        Ok(engine)
    }

    fn name(&self) -> &'static str { "bm25" }

    fn num_docs(&self) -> usize { self.corpus.len() }

    fn top_k_scored(&self, query: &str, k: usize) -> Vec<ScoredDoc> {
        let scores = self.scores(&self.query_vector(query));
        rank(&scores, k)
            .into_iter()
            .filter_map(|row| {
                self.doc_idxs.get(row).map(|doc_id| ScoredDoc { doc_id: doc_id.to_string(), score: scores[row] })
            })
            .collect()
    }
}
