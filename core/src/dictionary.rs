//! Bounded-memory vocabulary extraction.
//!
//! Term ids are assigned densely in first-seen order and are never reused
//! within a build: a pruned term that shows up again gets a fresh id and a
//! fresh document frequency.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use crate::error::IndexError;
use crate::index::{bag_of_words, SparseVector, TermId};

/// Thresholds applied by a pruning pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PruneParams {
    /// Drop terms found in fewer documents than this.
    pub no_below: u32,
    /// Drop terms found in more than this fraction of documents seen so far.
    pub no_above: f64,
    /// Fraction of `max_terms` kept after a pass.
    pub keep_ratio: f64,
}

impl Default for PruneParams {
    fn default() -> Self {
        Self { no_below: 10, no_above: 0.5, keep_ratio: 0.9 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PruneReport {
    pub docs_seen: u64,
    pub before: usize,
    pub after: usize,
    pub dropped_by_bounds: usize,
    pub dropped_by_cap: usize,
    /// The frequency bounds left fewer terms than the cap allowed.
    pub underflow: bool,
}

/// Bidirectional `term <-> id` map plus per-term document frequency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    token2id: HashMap<String, TermId>,
    id2token: BTreeMap<TermId, String>,
    dfs: HashMap<TermId, u32>,
    num_docs: u64,
    next_id: TermId,
}

impl Dictionary {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.token2id.len() }

    pub fn is_empty(&self) -> bool { self.token2id.is_empty() }

    pub fn id(&self, term: &str) -> Option<TermId> { self.token2id.get(term).copied() }

    pub fn term(&self, id: TermId) -> Option<&str> { self.id2token.get(&id).map(String::as_str) }

    pub fn doc_freq(&self, id: TermId) -> u32 { self.dfs.get(&id).copied().unwrap_or(0) }

    /// Documents added so far, including those whose terms were later pruned.
    pub fn num_docs(&self) -> u64 { self.num_docs }

    /// One past the largest id ever handed out.
    pub fn id_bound(&self) -> TermId { self.next_id }

    /// `(id, term, df)` in ascending id order.
    pub fn entries(&self) -> impl Iterator<Item = (TermId, &str, u32)> + '_ {
        self.id2token.iter().map(|(id, term)| (*id, term.as_str(), self.doc_freq(*id)))
    }

    /// Count one document: each distinct token bumps its document frequency.
    pub fn add_document<S: AsRef<str>>(&mut self, tokens: &[S]) {
        self.num_docs += 1;
        let mut seen: HashSet<&str> = HashSet::new();
        for token in tokens {
            let token = token.as_ref();
            if !seen.insert(token) { continue; }
            let tid = match self.token2id.get(token) {
                Some(&tid) => tid,
                None => {
                    let tid = self.next_id;
                    self.next_id += 1;
                    self.token2id.insert(token.to_string(), tid);
                    self.id2token.insert(tid, token.to_string());
                    tid
                }
            };
            *self.dfs.entry(tid).or_insert(0) += 1;
        }
    }

    /// Map tokens to a sorted sparse vector; unknown tokens are dropped.
    pub fn doc2bow<S: AsRef<str>>(&self, tokens: &[S]) -> SparseVector {
        bag_of_words(tokens.iter().map(|t| t.as_ref()), |t| self.id(t))
    }

    /// Drop terms outside the frequency bounds, then keep the `keep_n` most
    /// frequent survivors. Equal frequencies are ordered by term, ascending.
    pub fn prune(&mut self, keep_n: usize, params: &PruneParams) -> PruneReport {
        let before = self.len();
        let docs = self.num_docs.max(1) as f64;
        let mut survivors: Vec<(TermId, u32)> = self
            .dfs
            .iter()
            .filter(|&(_, &df)| df >= params.no_below && (df as f64 / docs) <= params.no_above)
            .map(|(&tid, &df)| (tid, df))
            .collect();
        let dropped_by_bounds = before - survivors.len();
        let underflow = survivors.len() < keep_n;
        survivors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| self.id2token[&a.0].cmp(&self.id2token[&b.0])));
        let dropped_by_cap = survivors.len().saturating_sub(keep_n);
        survivors.truncate(keep_n);

        let keep: HashSet<TermId> = survivors.into_iter().map(|(tid, _)| tid).collect();
        self.dfs.retain(|tid, _| keep.contains(tid));
        self.id2token.retain(|tid, _| keep.contains(tid));
        self.token2id.retain(|_, tid| keep.contains(tid));

        PruneReport {
            docs_seen: self.num_docs,
            before,
            after: self.len(),
            dropped_by_bounds,
            dropped_by_cap,
            underflow,
        }
    }

    pub fn to_record(&self) -> DictionaryRecord {
        DictionaryRecord {
            num_docs: self.num_docs,
            next_id: self.next_id,
            entries: self.entries().map(|(id, term, df)| (id, term.to_string(), df)).collect(),
        }
    }

    pub fn from_record(record: DictionaryRecord) -> Result<Self, IndexError> {
        let mut dict = Dictionary { num_docs: record.num_docs, next_id: record.next_id, ..Default::default() };
        for (id, term, df) in record.entries {
            if id >= record.next_id {
                return Err(IndexError::Corrupt(format!("term id {id} beyond id bound {}", record.next_id)));
            }
            if dict.token2id.insert(term.clone(), id).is_some() || dict.id2token.insert(id, term).is_some() {
                return Err(IndexError::Corrupt(format!("duplicate dictionary entry for id {id}")));
            }
            dict.dfs.insert(id, df);
        }
        Ok(dict)
    }
}

/// On-disk form of a [`Dictionary`].
#[derive(Debug, Serialize, Deserialize)]
pub struct DictionaryRecord {
    pub num_docs: u64,
    pub next_id: TermId,
    pub entries: Vec<(TermId, String, u32)>,
}

/// Running accumulator that prunes whenever the vocabulary outgrows `max_terms`.
#[derive(Debug)]
pub struct DictionaryBuilder {
    dict: Dictionary,
    max_terms: usize,
    params: PruneParams,
    prunes: Vec<PruneReport>,
}

impl DictionaryBuilder {
    pub fn new(max_terms: usize, params: PruneParams) -> Self {
        Self { dict: Dictionary::new(), max_terms, params, prunes: Vec::new() }
    }

    pub fn keep_n(&self) -> usize { (self.max_terms as f64 * self.params.keep_ratio).floor() as usize }

    pub fn add_document<S: AsRef<str>>(&mut self, tokens: &[S]) {
        self.dict.add_document(tokens);
        if self.dict.len() > self.max_terms {
            let start = Instant::now();
            let keep_n = self.keep_n();
            let report = self.dict.prune(keep_n, &self.params);
            tracing::info!(
                docs_seen = report.docs_seen,
                before = report.before,
                after = report.after,
                elapsed_s = start.elapsed().as_secs_f64(),
                "dictionary pruned"
            );
            if report.underflow {
                tracing::warn!(after = report.after, keep_n, "pruning kept fewer terms than the cap allows");
            }
            self.prunes.push(report);
        }
    }

    pub fn dictionary(&self) -> &Dictionary { &self.dict }

    pub fn prunes(&self) -> &[PruneReport] { &self.prunes }

    pub fn finish(self) -> Dictionary { self.dict }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(words: &str) -> Vec<String> {
        words.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn ids_follow_first_occurrence() {
        let mut d = Dictionary::new();
        d.add_document(&doc("b a b"));
        d.add_document(&doc("c a"));
        assert_eq!(d.id("b"), Some(0));
        assert_eq!(d.id("a"), Some(1));
        assert_eq!(d.id("c"), Some(2));
        assert_eq!(d.doc_freq(1), 2);
        assert_eq!(d.doc_freq(0), 1);
        assert_eq!(d.num_docs(), 2);
        assert_eq!(d.term(2), Some("c"));
    }

    #[test]
    fn prune_applies_bounds_then_cap() {
        let mut d = Dictionary::new();
        // "common" in every doc, "mid*" in 3 of 8, "rare" in 1.
        for i in 0..8 {
            let mut words = vec!["common".to_string()];
            if i < 3 {
                words.extend(["mid_a", "mid_b", "mid_c"].map(String::from));
            }
            if i == 0 {
                words.push("rare".into());
            }
            d.add_document(&words);
        }
        let params = PruneParams { no_below: 2, no_above: 0.5, keep_ratio: 0.9 };
        let report = d.prune(2, &params);
        assert_eq!(report.before, 5);
        assert_eq!(report.dropped_by_bounds, 2);
        assert_eq!(report.dropped_by_cap, 1);
        assert!(!report.underflow);
        // ties at df=3 resolved lexicographically
        assert_eq!(d.id("mid_a"), Some(1));
        assert_eq!(d.id("mid_b"), Some(2));
        assert_eq!(d.id("mid_c"), None);
        assert_eq!(d.id("common"), None);
        assert_eq!(d.id("rare"), None);
    }

    #[test]
    fn lower_bound_can_leave_fewer_terms_than_the_cap() {
        let mut b = DictionaryBuilder::new(10, PruneParams::default());
        let words: Vec<String> = (0..12).map(|i| format!("w{i}")).collect();
        b.add_document(&words);
        let report = &b.prunes()[0];
        assert!(report.underflow);
        assert!(report.after < b.keep_n());
        assert_eq!(report.before, 12);
        assert_eq!(report.dropped_by_bounds, 12);
        assert_eq!(report.dropped_by_cap, 0);
        assert!(b.dictionary().is_empty());
    }

    #[test]
    fn pruned_term_returns_with_new_id() {
        let mut d = Dictionary::new();
        d.add_document(&doc("gone"));
        d.prune(0, &PruneParams::default());
        assert!(d.is_empty());
        d.add_document(&doc("gone"));
        assert_eq!(d.id("gone"), Some(1));
        assert_eq!(d.doc_freq(1), 1);
        assert_eq!(d.id_bound(), 2);
    }

    #[test]
    fn builder_keeps_vocabulary_under_cap() {
        let mut b = DictionaryBuilder::new(20, PruneParams { no_below: 1, no_above: 1.0, keep_ratio: 0.9 });
        for i in 0..50 {
            b.add_document(&[format!("t{i}"), format!("u{i}"), "shared".to_string()]);
            assert!(b.dictionary().len() <= 20 + 3);
        }
        assert!(!b.prunes().is_empty());
        for report in b.prunes() {
            assert!(report.after <= 18);
        }
        assert!(b.dictionary().id("shared").is_some());
    }

    #[test]
    fn record_round_trip_preserves_ids_and_frequencies() {
        let mut d = Dictionary::new();
        d.add_document(&doc("x y"));
        d.add_document(&doc("y z"));
        let back = Dictionary::from_record(d.to_record()).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn record_with_duplicate_ids_is_corrupt() {
        let record = DictionaryRecord { num_docs: 1, next_id: 2, entries: vec![(0, "a".into(), 1), (0, "b".into(), 1)] };
        assert!(Dictionary::from_record(record).is_err());
    }
}
