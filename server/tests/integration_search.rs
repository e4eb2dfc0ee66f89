use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use retrieval_core::build::{build_index, BuildConfig};
use retrieval_core::document::DocumentSet;
use retrieval_core::engine::EngineConfig;
use retrieval_core::normalizer::{NormalizerConfig, TextNormalizer};
use retrieval_core::persist::IndexPaths;
use serde_json::Value;
use server::{build_app, ServerSettings};
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn build_tiny_index(root: &Path, docs: &[(&str, &str)]) -> IndexPaths {
    let docs_dir = root.join("docs");
    fs::create_dir_all(&docs_dir).unwrap();
    for (id, text) in docs {
        fs::write(docs_dir.join(format!("{id}.txt")), text).unwrap();
    }
    let paths = IndexPaths::for_dataset(root.join("processed"), "tiny");
    let set = DocumentSet::from_dir(&docs_dir).unwrap();
    build_index(&set, &TextNormalizer::default(), &BuildConfig::default(), &paths).unwrap();
    paths
}

fn settings(paths: IndexPaths) -> ServerSettings {
    ServerSettings {
        class: "bm25".into(),
        paths,
        normalizer: NormalizerConfig::default(),
        engine: EngineConfig::default(),
        admin_token: Some("secret".into()),
    }
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let paths = build_tiny_index(dir.path(), &[("doc0", "Rust is great. rust systems programming."), ("doc1", "Learning go."), ("doc2", "Cooking pasta")]);
    let app = build_app(settings(paths)).unwrap();

    let (status, json) = call(&app, get("/search?q=rust&k=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 2);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    assert_eq!(arr[0]["doc_id"], "doc0");
    assert!(arr[0]["score"].as_f64().unwrap() > 0.0);
    assert_eq!(arr[1]["score"].as_f64().unwrap(), 0.0);
}

#[tokio::test]
async fn reload_requires_token_and_picks_up_rebuilt_index() {
    let dir = tempdir().unwrap();
    let paths = build_tiny_index(dir.path(), &[("a", "alpha"), ("b", "beta")]);
    let app = build_app(settings(paths)).unwrap();

    let (status, _) = call(&app, Request::post("/index/reload").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    build_tiny_index(dir.path(), &[("c", "gamma ray")]);
    let (_, before) = call(&app, get("/search?q=gamma")).await;
    assert_eq!(before["total_hits"], 2);

    let req = Request::post("/index/reload").header("X-ADMIN-TOKEN", "secret").body(Body::empty()).unwrap();
    let (status, json) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 3);

    let (_, after) = call(&app, get("/search?q=gamma")).await;
    assert_eq!(after["total_hits"], 3);
    assert_eq!(after["results"][0]["doc_id"], "c");
}

#[tokio::test]
async fn result_count_is_min_of_k_and_corpus_size() {
    let dir = tempdir().unwrap();
    let paths = build_tiny_index(dir.path(), &[("a", "alpha"), ("b", "beta"), ("c", "gamma")]);
    let app = build_app(settings(paths)).unwrap();

    for (k, expected) in [(0, 0), (1, 1), (3, 3), (50, 3)] {
        let (status, json) = call(&app, get(&format!("/search?q=beta&k={k}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_hits"], expected);
        assert_eq!(json["results"].as_array().unwrap().len(), expected);
    }
}

#[tokio::test]
async fn missing_index_fails_startup() {
    let dir = tempdir().unwrap();
    assert!(build_app(settings(IndexPaths::new(dir.path()))).is_err());
}
