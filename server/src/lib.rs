use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::HeaderValue, routing::get, Json, Router};
use postdex_core::persist::IndexPaths;
use postdex_core::{DocId, SearchEngine, SearchHit};
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
fn default_k() -> usize { 20 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    /// "frequency" or "weight": what each hit's `value` holds.
    pub value_kind: &'static str,
    pub results: Vec<SearchHit>,
}

/// The engine is immutable after load, so handlers share it without locks.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SearchEngine>,
}

pub fn build_app(index_dir: &std::path::Path) -> Result<Router> {
    let engine = SearchEngine::open(&IndexPaths::new(index_dir))?;
    tracing::info!(index_dir = %index_dir.display(), num_docs = engine.num_docs(), "index loaded");
    Ok(build_app_with_engine(Arc::new(engine)))
}

pub fn build_app_with_engine(engine: Arc<SearchEngine>) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(AppState { engine })
        .layer(cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref()))
        .layer(TraceLayer::new_for_http())
}

/// Comma-separated origins; anything unset or unparsable allows every origin.
fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let hits = state.engine.search_hits(&params.q);
    let total_hits = hits.len();
    let k = params.k.clamp(1, 100);
    let results: Vec<SearchHit> = hits.into_iter().take(k).collect();
    let elapsed = start.elapsed();
    tracing::debug!(query = %params.q, total_hits, "search");
    Json(SearchResponse {
        query: params.q,
        took_s: elapsed.as_secs_f64(),
        total_hits,
        value_kind: state.engine.value_kind().column_name(),
        results,
    })
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Json<serde_json::Value> {
    match state.engine.document(doc_id) {
        Some(name) => Json(serde_json::json!({ "doc_id": doc_id, "document": name })),
        None => Json(serde_json::json!({ "error": "not found" })),
    }
}
