//! HTTP boundary for the knowledge engine: thin routing, JSON marshaling,
//! and input validation. The engine is constructed by the caller and injected
//! as shared state; handlers never touch global state.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kb::{DocMeta, KnowledgeEngine, QueryContext, RelevantDoc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

type ApiError = (StatusCode, Json<Value>);

#[derive(Deserialize)]
pub struct ContextRequest {
    #[serde(default)]
    pub query: String,
}

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    pub top_k: Option<usize>,
}

#[derive(Deserialize)]
pub struct KeywordsRequest {
    #[serde(default)]
    pub text: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub relevant_documents: Vec<RelevantDoc>,
}

#[derive(Serialize)]
pub struct KeywordsResponse {
    pub keywords: Vec<String>,
}

#[derive(Serialize)]
pub struct DocumentsResponse {
    pub count: usize,
    pub documents: Vec<DocMeta>,
}

pub fn build_app(engine: Arc<KnowledgeEngine>) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new()
                    .allow_origin(AllowOrigin::list(origins))
                    .allow_methods(Any)
                    .allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health))
        .route("/documents", get(list_documents))
        .route("/extract-context", post(extract_context))
        .route("/search-knowledge-base", post(search_knowledge_base))
        .route("/extract-keywords", post(extract_keywords))
        .with_state(engine)
        .layer(cors)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "knowledge-retrieval" }))
}

async fn list_documents(State(engine): State<Arc<KnowledgeEngine>>) -> Json<DocumentsResponse> {
    let documents = engine.documents();
    Json(DocumentsResponse { count: documents.len(), documents })
}

async fn extract_context(
    State(engine): State<Arc<KnowledgeEngine>>,
    Json(req): Json<ContextRequest>,
) -> Result<Json<QueryContext>, ApiError> {
    require_nonempty(&req.query, "Query is required")?;
    Ok(Json(engine.build_query_context(&req.query)))
}

async fn search_knowledge_base(
    State(engine): State<Arc<KnowledgeEngine>>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    require_nonempty(&req.query, "Query is required")?;
    let top_k = req.top_k.unwrap_or_else(|| engine.default_top_k());
    let relevant_documents = engine.find_relevant_documents(&req.query, top_k);
    Ok(Json(SearchResponse { relevant_documents }))
}

async fn extract_keywords(
    State(engine): State<Arc<KnowledgeEngine>>,
    Json(req): Json<KeywordsRequest>,
) -> Result<Json<KeywordsResponse>, ApiError> {
    require_nonempty(&req.text, "Text is required")?;
    Ok(Json(KeywordsResponse { keywords: engine.extract_keywords(&req.text) }))
}

/// Empty input is a caller error and never reaches the engine.
fn require_nonempty(value: &str, message: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": message }))));
    }
    Ok(())
}
