use serde::Serialize;

use crate::bm25::{Bm25Engine, Bm25Params};
use crate::error::IndexError;
use crate::normalizer::Normalizer;
use crate::persist::IndexPaths;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDoc {
    pub doc_id: String,
    pub score: f32,
}

/// Tuning knobs for every engine kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    pub bm25: Bm25Params,
}

/// A loaded, read-only ranking engine. Safe to query from many threads.
pub trait RetrievalEngine: Send + Sync {
    fn load(paths: &IndexPaths, normalizer: Box<dyn Normalizer>, config: &EngineConfig) -> Result<Self, IndexError>
    where
        Self: Sized;

    fn name(&self) -> &'static str;

    fn num_docs(&self) -> usize;

    /// Exactly `min(k, num_docs)` distinct documents, best first.
    fn top_k_scored(&self, query: &str, k: usize) -> Vec<ScoredDoc>;

    fn top_k(&self, query: &str, k: usize) -> Vec<String> {
        self.top_k_scored(query, k).into_iter().map(|hit| hit.doc_id).collect()
    }
}

type EngineLoader = fn(&IndexPaths, Box<dyn Normalizer>, &EngineConfig) -> Result<Box<dyn RetrievalEngine>, IndexError>;

fn boxed<E: RetrievalEngine + 'static>(
    paths: &IndexPaths,
    normalizer: Box<dyn Normalizer>,
    config: &EngineConfig,
) -> Result<Box<dyn RetrievalEngine>, IndexError> {
    Ok(Box::new(E::load(paths, normalizer, config)?))
}

const ENGINES: &[(&str, EngineLoader)] = &[("bm25", boxed::<Bm25Engine>)];

pub fn engine_names() -> impl Iterator<Item = &'static str> {
    ENGINES.iter().map(|(name, _)| *name)
}

/// Load the engine registered under `class`.
pub fn load_engine(
    class: &str,
    paths: &IndexPaths,
    normalizer: Box<dyn Normalizer>,
    config: &EngineConfig,
) -> Result<Box<dyn RetrievalEngine>, IndexError> {
    let (_, loader) = ENGINES
        .iter()
        .find(|(name, _)| *name == class)
        .ok_or_else(|| IndexError::UnknownEngine(class.to_string()))?;
    loader(paths, normalizer, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::TextNormalizer;

    #[test]
    fn bm25_is_registered() {
        assert_eq!(engine_names().collect::<Vec<_>>(), vec!["bm25"]);
    }

    #[test]
    fn unknown_class_is_rejected() {
        let paths = IndexPaths::new("does-not-matter");
        let res = load_engine("tfidf", &paths, Box::new(TextNormalizer::default()), &EngineConfig::default());
        assert!(matches!(res, Err(IndexError::UnknownEngine(name)) if name == "tfidf"));
    }
}
