use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use super::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let response = json!({
        "status": "healthy",
        "service": "ai-text-server",
        "version": env!("CARGO_PKG_VERSION"),
        "modelBackend": state.model.name(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    (StatusCode::OK, Json(response))
}
