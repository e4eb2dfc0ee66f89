pub mod bm25;
pub mod build;
pub mod corpus;
pub mod dictionary;
pub mod document;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod index;
pub mod normalizer;
pub mod persist;

pub use index::*;
