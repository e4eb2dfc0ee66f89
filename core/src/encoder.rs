use std::iter::FusedIterator;
use std::slice;
use std::time::Instant;

use crate::dictionary::Dictionary;
use crate::document::{DocumentEntry, DocumentSet};
use crate::error::BuildInputError;
use crate::index::SparseVector;
use crate::normalizer::Normalizer;

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedDocument {
    pub doc_id: String,
    pub vector: SparseVector,
}

/// Single-pass stream of sparse vectors, one per document, in input order.
///
/// Each document is re-read and re-normalized; only one document is resident
/// at a time. Once exhausted it stays exhausted; build a new encoder over the
/// same documents and dictionary to replay.
pub struct CorpusEncoder<'a, N: Normalizer + ?Sized> {
    docs: slice::Iter<'a, DocumentEntry>,
    dictionary: &'a Dictionary,
    normalizer: &'a N,
    progress_every: usize,
    emitted: usize,
    clock: Instant,
}

impl<'a, N: Normalizer + ?Sized> CorpusEncoder<'a, N> {
    pub fn new(docs: &'a DocumentSet, dictionary: &'a Dictionary, normalizer: &'a N) -> Self {
        Self {
            docs: docs.iter(),
            dictionary,
            normalizer,
            progress_every: 1000,
            emitted: 0,
            clock: Instant::now(),
        }
    }

    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }

    /// Documents taken off the input so far, failed ones included.
    pub fn emitted(&self) -> usize { self.emitted }

    fn report_progress(&mut self) {
        if self.progress_every == 0 || self.emitted % self.progress_every != 0 { return; }
        tracing::info!(
            "{} iterations took {:.2} seconds. {} done.",
            self.progress_every,
            self.clock.elapsed().as_secs_f64(),
            self.emitted
        );
        self.clock = Instant::now();
    }
}

impl<N: Normalizer + ?Sized> Iterator for CorpusEncoder<'_, N> {
    type Item = Result<EncodedDocument, BuildInputError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.docs.next()?;
        let encoded = entry.read().map(|text| {
            let tokens = self.normalizer.normalize(&text);
            EncodedDocument { doc_id: entry.id.clone(), vector: self.dictionary.doc2bow(&tokens) }
        });
        self.emitted += 1;
        self.report_progress();
        Some(encoded)
    }

    fn size_hint(&self) -> (usize, Option<usize>) { self.docs.size_hint() }
}

impl<N: Normalizer + ?Sized> FusedIterator for CorpusEncoder<'_, N> {}
