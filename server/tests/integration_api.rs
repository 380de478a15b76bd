use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use kb::{KbConfig, KnowledgeEngine};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

fn app_with_corpus(dir: &std::path::Path) -> Router {
    fs::write(
        dir.join("cockroach-control.md"),
        "Cockroaches hide in warm, dark places near water and food sources.",
    )
    .unwrap();
    fs::write(
        dir.join("ant-baiting.md"),
        "Ant bait stations work slowly but reach the whole colony.",
    )
    .unwrap();
    let engine = KnowledgeEngine::new(KbConfig::with_kb_dir(dir)).unwrap();
    server::build_app(Arc::new(engine))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let req = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());
    let (status, body) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn extract_context_returns_full_shape() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());
    let query = "How do I get rid of cockroaches in my kitchen?";
    let (status, body) = post(app, "/extract-context", json!({ "query": query })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["original_query"], query);
    assert!(body["keywords"].as_array().unwrap().iter().any(|k| k == "cockroach"));
    let docs = body["relevant_docs"].as_array().unwrap();
    assert_eq!(docs[0]["filename"], "cockroach-control.md");
    assert!(docs[0]["similarity_score"].as_f64().unwrap() > 0.1);
    for bucket in ["pests", "products", "locations", "other"] {
        assert!(body["entities"][bucket].is_array());
    }
}

#[tokio::test]
async fn documents_lists_metadata_without_content() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());
    let (status, body) = get(app, "/documents").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    let docs = body["documents"].as_array().unwrap();
    assert!(docs.iter().any(|d| d["filename"] == "ant-baiting.md"));
    assert!(docs[0].get("content_preview").is_none());
}

#[tokio::test]
async fn missing_query_is_rejected() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());
    let (status, body) = post(app, "/extract-context", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Query is required");
}

#[tokio::test]
async fn search_respects_top_k() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());
    let (status, body) =
        post(app, "/search-knowledge-base", json!({ "query": "cockroaches and ants", "top_k": 1 }))
            .await;
    assert_eq!(status, StatusCode::OK);
    let docs = body["relevant_documents"].as_array().unwrap();
    assert!(docs.len() <= 1);
}

#[tokio::test]
async fn extract_keywords_round_trip_and_validation() {
    let dir = tempdir().unwrap();
    let app = app_with_corpus(dir.path());

    let (status, body) = post(
        app.clone(),
        "/extract-keywords",
        json!({ "text": "Spraying for termites in Cairo" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let keywords = body["keywords"].as_array().unwrap();
    assert!(keywords.iter().any(|k| k == "termite"));
    assert!(keywords.iter().any(|k| k == "cairo"));

    let (status, body) = post(app, "/extract-keywords", json!({ "text": "" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Text is required");
}
