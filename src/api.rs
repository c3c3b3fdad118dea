//! HTTP слой: справочники и построение признаков для прогноза

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::error::PipelineError;
use crate::serving::{FeatureExpander, FeatureRequest};
use crate::types::RaceVariant;

type ApiResult = Result<Json<serde_json::Value>, (StatusCode, String)>;

#[derive(Clone)]
pub struct AppState {
    expanders: Arc<HashMap<RaceVariant, FeatureExpander>>,
}

impl AppState {
    pub fn new(expanders: impl IntoIterator<Item = FeatureExpander>) -> Self {
        let expanders = expanders.into_iter().map(|e| (e.variant(), e)).collect();
        Self {
            expanders: Arc::new(expanders),
        }
    }

    fn expander(&self, variant: &str) -> Result<&FeatureExpander, (StatusCode, String)> {
        let variant: RaceVariant = variant.parse().map_err(|e: String| (StatusCode::NOT_FOUND, e))?;
        self.expanders
            .get(&variant)
            .ok_or_else(|| (StatusCode::SERVICE_UNAVAILABLE, format!("pick-lists for {variant} are not loaded")))
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> ApiResult {
    serde_json::to_value(value)
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("Serialization error: {}", e)))
}

fn expansion_error(e: PipelineError) -> (StatusCode, String) {
    match e {
        PipelineError::UnknownReference { .. } => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub fn router(state: AppState) -> Router {
    // CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/api/:variant/options/:kind", get(options))
        .route("/api/:variant/features", post(features))
        .route("/api/:variant/features/batch", post(features_batch))
        .layer(cors)
        .with_state(state)
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Race outcome feature API (Rust)",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut variants: Vec<String> = state.expanders.keys().map(|v| v.to_string()).collect();
    variants.sort();
    Json(serde_json::json!({ "status": "ok", "variants": variants }))
}

async fn options(State(state): State<AppState>, Path((variant, kind)): Path<(String, String)>) -> ApiResult {
    let expander = state.expander(&variant)?;
    let lists = expander.pick_lists();
    match kind.as_str() {
        "drivers" => to_json(&lists.drivers),
        "constructors" => to_json(&lists.constructors),
        "circuits" => to_json(&lists.circuits),
        other => Err((StatusCode::NOT_FOUND, format!("unknown option list: {other}"))),
    }
}

async fn features(
    State(state): State<AppState>,
    Path(variant): Path<String>,
    Json(request): Json<FeatureRequest>,
) -> ApiResult {
    tracing::info!("Feature request for {}: {} / {} @ {}", variant, request.driver, request.constructor, request.circuit);
    let expander = state.expander(&variant)?;
    let row = expander.expand(&request).map_err(expansion_error)?;
    Ok(Json(row.to_json()))
}

async fn features_batch(
    State(state): State<AppState>,
    Path(variant): Path<String>,
    Json(requests): Json<Vec<FeatureRequest>>,
) -> ApiResult {
    tracing::info!("Batch feature request for {}: {} rows", variant, requests.len());
    let expander = state.expander(&variant)?;
    let rows = requests
        .iter()
        .map(|request| expander.expand(request).map(|row| row.to_json()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(expansion_error)?;
    Ok(Json(serde_json::Value::Array(rows)))
}
