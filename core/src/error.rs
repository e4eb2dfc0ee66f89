use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::normalizer::NormalizerConfig;

/// A single document that could not be read or normalized during a build.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("document {doc_id} ({}): {reason}", .path.display())]
pub struct BuildInputError {
    pub doc_id: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Fatal conditions that stop an index build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot list documents in {}: {reason}", .path.display())]
    DocsDir { path: PathBuf, reason: String },
    #[error("build aborted: {0}")]
    Input(#[from] BuildInputError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dictionary serialization failed: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("json serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot format build timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Failures loading a persisted index or selecting an engine.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index artifact {artifact} missing at {}", .path.display())]
    Missing { artifact: &'static str, path: PathBuf },
    #[error("index corrupt: {0}")]
    Corrupt(String),
    #[error("normalizer config mismatch: index built with {built:?}, query uses {query:?}")]
    ConfigMismatch {
        built: Box<NormalizerConfig>,
        query: Box<NormalizerConfig>,
    },
    #[error("unknown engine class {0:?}")]
    UnknownEngine(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dictionary decode failed: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("json decode failed: {0}")]
    Json(#[from] serde_json::Error),
}
