use anyhow::Result;
use axum::{extract::{Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use parking_lot::RwLock;
use retrieval_core::engine::{load_engine, EngineConfig, RetrievalEngine, ScoredDoc};
use retrieval_core::error::IndexError;
use retrieval_core::normalizer::{NormalizerConfig, TextNormalizer};
use retrieval_core::persist::IndexPaths;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<ScoredDoc>,
}

/// Which index to serve and how to read queries against it.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub class: String,
    pub paths: IndexPaths,
    pub normalizer: NormalizerConfig,
    pub engine: EngineConfig,
    pub admin_token: Option<String>,
}

impl ServerSettings {
    pub fn load_engine(&self) -> Result<Arc<dyn RetrievalEngine>, IndexError> {
        let normalizer = Box::new(TextNormalizer::new(self.normalizer.clone()));
        Ok(Arc::from(load_engine(&self.class, &self.paths, normalizer, &self.engine)?))
    }
}

/// The engine is swapped whole on reload; in-flight queries keep the one they
/// started with.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RwLock<Arc<dyn RetrievalEngine>>>,
    pub settings: Arc<ServerSettings>,
}

impl AppState {
    fn current(&self) -> Arc<dyn RetrievalEngine> { self.engine.read().clone() }
}

pub fn build_app(settings: ServerSettings) -> Result<Router> {
    let engine = settings.load_engine()?;
    let app_state = AppState { engine: Arc::new(RwLock::new(engine)), settings: Arc::new(settings) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let engine = state.current();
    let k = params.k.min(100);
    let query = params.q;
    // Scoring scans the whole corpus.
    let (query, results) = tokio::task::spawn_blocking(move || {
        let results = engine.top_k_scored(&query, k);
        (query, results)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query, took_s: elapsed.as_secs_f64(), total_hits: results.len(), results }))
}

async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    let settings = state.settings.clone();
    let engine = tokio::task::spawn_blocking(move || settings.load_engine())
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            tracing::warn!(error = %e, "reload failed; keeping current engine");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        })?;
    let body = serde_json::json!({ "engine": engine.name(), "num_docs": engine.num_docs() });
    *state.engine.write() = engine;
    tracing::info!(root = %state.settings.paths.root.display(), "index reloaded");
    Ok(Json(body))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.settings.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
