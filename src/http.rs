use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::Value;

use crate::{
    catalog,
    service::{Envelope, ExpenseService},
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ExpenseService>,
    pub metrics: Option<PrometheusHandle>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tools/add_expense", post(add_expense))
        .route("/tools/list_expenses", post(list_expenses))
        .route("/tools/summarize", post(summarize))
        .route("/resources/categories", get(categories))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

type ToolArgs = Result<Json<Value>, JsonRejection>;

/// Unreadable bodies are answered with the same error envelope as bad arguments.
fn decode(body: ToolArgs) -> Result<Value, Json<Value>> {
    body.map(|Json(args)| args).map_err(|e| {
        tracing::warn!(error = %e, "Rejected request body");
        Json(Envelope::<()>::error(format!("Invalid arguments: {}", e)).to_json())
    })
}

async fn add_expense(State(state): State<AppState>, body: ToolArgs) -> Json<Value> {
    match decode(body) {
        Ok(args) => Json(state.service.add_expense(args).await.to_json()),
        Err(envelope) => envelope,
    }
}

async fn list_expenses(State(state): State<AppState>, body: ToolArgs) -> Json<Value> {
    match decode(body) {
        Ok(args) => Json(state.service.list_expenses(args).await.to_json()),
        Err(envelope) => envelope,
    }
}

async fn summarize(State(state): State<AppState>, body: ToolArgs) -> Json<Value> {
    match decode(body) {
        Ok(args) => Json(state.service.summarize(args).await.to_json()),
        Err(envelope) => envelope,
    }
}

async fn categories(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, catalog::MIME_TYPE)],
        state.service.categories().await,
    )
}

async fn health() -> &'static str {
    "ok"
}

async fn render_metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
