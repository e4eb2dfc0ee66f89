use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use retrieval_core::bm25::Bm25Params;
use retrieval_core::engine::EngineConfig;
use retrieval_core::normalizer::NormalizerConfig;
use retrieval_core::persist::IndexPaths;
use server::{build_app, ServerSettings};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Root directory holding one sub-directory per dataset
    #[arg(long, env = "RETRIEVAL_DATA_DIR", default_value = "data/processed")]
    data_dir: PathBuf,
    /// Dataset identifier to serve
    #[arg(long)]
    id: String,
    /// Engine kind
    #[arg(long, default_value = "bm25")]
    class: String,
    /// JSON file with the normalizer config used at build time (defaults otherwise)
    #[arg(long)]
    normalizer: Option<PathBuf>,
    #[arg(long, default_value_t = 1.5)]
    k1: f32,
    #[arg(long, default_value_t = 0.75)]
    b: f32,
    /// Token required by POST /index/reload
    #[arg(long, env = "ADMIN_TOKEN")]
    admin_token: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let normalizer = match &args.normalizer {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<NormalizerConfig>(&text)?
        }
        None => NormalizerConfig::default(),
    };
    let settings = ServerSettings {
        class: args.class,
        paths: IndexPaths::for_dataset(&args.data_dir, &args.id),
        normalizer,
        engine: EngineConfig { bm25: Bm25Params { k1: args.k1, b: args.b } },
        admin_token: args.admin_token,
    };
    let app: Router = build_app(settings)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
