use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use retrieval_core::bm25::Bm25Params;
use retrieval_core::build::{build_index, BuildConfig, BuildReport, FailurePolicy};
use retrieval_core::dictionary::PruneParams;
use retrieval_core::document::DocumentSet;
use retrieval_core::engine::{engine_names, load_engine, EngineConfig, ScoredDoc};
use retrieval_core::normalizer::{Language, NormalizerConfig, TextNormalizer};
use retrieval_core::persist::IndexPaths;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build BM25 corpus indexes and query them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build dictionary, corpus and doc index map from a directory of .txt files
    Build {
        /// Directory containing one .txt file per document
        #[arg(long)]
        docs_dir: PathBuf,
        /// Name of the dataset directory the index is written to
        #[arg(long)]
        dataset_name: String,
        #[command(flatten)]
        store: StoreArgs,
        /// Vocabulary size that triggers a pruning pass
        #[arg(long, default_value_t = 2_000_000)]
        max_terms: usize,
        /// Pruning drops terms found in fewer documents than this
        #[arg(long, default_value_t = 10)]
        no_below: u32,
        /// Pruning drops terms found in more than this fraction of documents
        #[arg(long, default_value_t = 0.5)]
        no_above: f64,
        /// Log encoding progress every N documents (0 disables)
        #[arg(long, default_value_t = 1000)]
        progress_every: usize,
        /// Abort on the first unreadable document instead of skipping it
        #[arg(long, default_value_t = false)]
        fail_fast: bool,
        #[command(flatten)]
        normalizer: NormalizerArgs,
    },
    /// Print the ids of the top-k documents for a query, best first
    Query {
        /// Engine kind
        #[arg(long, default_value = "bm25")]
        class: String,
        /// Dataset identifier used at build time
        #[arg(long)]
        id: String,
        /// Free-text query
        #[arg(long)]
        query: String,
        /// Number of results
        #[arg(short, long, default_value_t = 10)]
        k: usize,
        #[command(flatten)]
        store: StoreArgs,
        /// BM25 term-frequency saturation
        #[arg(long, default_value_t = 1.5)]
        k1: f32,
        /// BM25 length normalization
        #[arg(long, default_value_t = 0.75)]
        b: f32,
        /// Print scores next to the ids
        #[arg(long, default_value_t = false)]
        scores: bool,
        #[command(flatten)]
        normalizer: NormalizerArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct StoreArgs {
    /// Root directory holding one sub-directory per dataset
    #[arg(long, env = "RETRIEVAL_DATA_DIR", default_value = "data/processed")]
    data_dir: PathBuf,
}

/// Must be identical for build and query; the index records it and refuses
/// to load under a different one.
#[derive(Args, Debug, Clone)]
struct NormalizerArgs {
    /// Stopword list and stemmer language (english, spanish)
    #[arg(long, default_value = "english")]
    language: Language,
    #[arg(long, default_value_t = false)]
    keep_case: bool,
    #[arg(long, default_value_t = false)]
    keep_urls: bool,
    #[arg(long, default_value_t = false)]
    keep_accents: bool,
    #[arg(long, default_value_t = false)]
    strip_numbers: bool,
    /// Split words on anything that is not a letter
    #[arg(long, default_value_t = false)]
    alphabetic_only: bool,
    #[arg(long, default_value_t = false)]
    keep_stopwords: bool,
    #[arg(long, default_value_t = false)]
    no_stem: bool,
}

impl NormalizerArgs {
    fn config(&self) -> NormalizerConfig {
        NormalizerConfig {
            language: self.language,
            lowercase: !self.keep_case,
            strip_urls: !self.keep_urls,
            strip_accents: !self.keep_accents,
            strip_numbers: self.strip_numbers,
            alphabetic_only: self.alphabetic_only,
            remove_stopwords: !self.keep_stopwords,
            stem: !self.no_stem,
        }
    }
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { docs_dir, dataset_name, store, max_terms, no_below, no_above, progress_every, fail_fast, normalizer } => {
            let config = BuildConfig {
                max_terms,
                prune: PruneParams { no_below, no_above, ..PruneParams::default() },
                progress_every,
                failure_policy: if fail_fast { FailurePolicy::Abort } else { FailurePolicy::Skip },
            };
            let paths = IndexPaths::for_dataset(&store.data_dir, &dataset_name);
            let report = run_build(&docs_dir, &paths, &config, normalizer.config())?;
            for failure in &report.failures {
                eprintln!("skipped {failure}");
            }
            Ok(())
        }
        Commands::Query { class, id, query, k, store, k1, b, scores, normalizer } => {
            let paths = IndexPaths::for_dataset(&store.data_dir, &id);
            let config = EngineConfig { bm25: Bm25Params { k1, b } };
            for hit in run_query(&class, &paths, &config, normalizer.config(), &query, k)? {
                if scores {
                    println!("{}\t{:.6}", hit.doc_id, hit.score);
                } else {
                    println!("{}", hit.doc_id);
                }
            }
            Ok(())
        }
    }
}

fn run_build(docs_dir: &Path, paths: &IndexPaths, config: &BuildConfig, normalizer: NormalizerConfig) -> Result<BuildReport> {
    let docs = DocumentSet::from_dir(docs_dir)?;
    tracing::info!(docs = docs.len(), dir = %docs_dir.display(), "found documents");
    let report = build_index(&docs, &TextNormalizer::new(normalizer), config, paths)
        .with_context(|| format!("building index at {}", paths.root.display()))?;
    tracing::info!(
        num_docs = report.num_docs,
        num_terms = report.num_terms,
        prunes = report.prunes.len(),
        failures = report.failures.len(),
        "build finished"
    );
    Ok(report)
}

fn run_query(
    class: &str,
    paths: &IndexPaths,
    config: &EngineConfig,
    normalizer: NormalizerConfig,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredDoc>> {
    let engine = load_engine(class, paths, Box::new(TextNormalizer::new(normalizer)), config).with_context(|| {
        format!("loading {class} index from {} (known engines: {})", paths.root.display(), engine_names().collect::<Vec<_>>().join(", "))
    })?;
    Ok(engine.top_k_scored(query, k))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn default_flags_give_default_normalizer() {
        let cli = Cli::try_parse_from(["indexer", "query", "--id", "laws", "--query", "water"]).unwrap();
        let Commands::Query { normalizer, class, k, .. } = cli.command else { panic!("expected query") };
        assert_eq!(normalizer.config(), NormalizerConfig::default());
        assert_eq!(class, "bm25");
        assert_eq!(k, 10);
    }

    #[test]
    fn build_then_query_round_trip() {
        let tmp = tempdir().unwrap();
        let docs = tmp.path().join("docs");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("ley_1.txt"), "Ley de aguas y protección de ríos").unwrap();
        fs::write(docs.join("ley_2.txt"), "Ley forestal sobre bosques nativos").unwrap();

        let normalizer = NormalizerConfig { language: Language::Spanish, ..NormalizerConfig::default() };
        let paths = IndexPaths::for_dataset(tmp.path().join("processed"), "chile");
        let report = run_build(&docs, &paths, &BuildConfig::default(), normalizer.clone()).unwrap();
        assert_eq!(report.num_docs, 2);

        let hits = run_query("bm25", &paths, &EngineConfig::default(), normalizer, "bosques", 2).unwrap();
        assert_eq!(hits[0].doc_id, "ley_2");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn unknown_engine_class_fails() {
        let tmp = tempdir().unwrap();
        let paths = IndexPaths::new(tmp.path());
        assert!(run_query("lsi", &paths, &EngineConfig::default(), NormalizerConfig::default(), "x", 1).is_err());
    }
}
