// API: HTTP surface of the text operations service
//
// POST /api/ai/detect            -> detect::detect_content
// POST /api/generate/article     -> generate::generate_article
// POST /api/generate/titles      -> generate::generate_titles
// POST /api/generate/quotes      -> generate::generate_quotes
// POST /api/generate/rewrite     -> generate::rewrite_text
// POST /api/classify/ticket      -> classify::classify_ticket
// POST /api/classify/resume      -> classify::analyze_resume     (multipart)
// POST /api/classify/sentiment   -> classify::analyze_sentiment
// POST /api/assistant/respond    -> assistant::respond_assistant (multipart)
// GET  /health                   -> health::health_check
//
// Any other path or method answers with a 404 envelope.

pub mod assistant;
pub mod classify;
pub mod detect;
pub mod document;
pub mod envelope;
pub mod extract;
pub mod generate;
pub mod health;

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, Uri},
    routing::{get, post},
};
use tokio::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::InvocationError;
use crate::errors::AppError;
use crate::models::{ModelOutput, ModelPayload, OperationKind, SharedModelClient};

/// Room for multipart framing and form fields on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub model: SharedModelClient,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(model: SharedModelClient, config: Config) -> Self {
        Self {
            model,
            config: Arc::new(config),
        }
    }

    pub fn model_timeout(&self) -> Duration {
        self.config.models.timeout()
    }

    /// Fresh model-wait budget for one incoming request.
    pub fn budget(&self) -> ModelBudget {
        ModelBudget::new(self.model_timeout())
    }

    /// One model call drawing on the request's remaining budget.
    pub async fn invoke(
        &self,
        budget: &ModelBudget,
        kind: OperationKind,
        payload: ModelPayload,
    ) -> Result<ModelOutput, AppError> {
        let remaining = budget.remaining();
        if remaining.is_zero() {
            tracing::error!(operation = %kind, "Request budget spent before model call");
            return Err(InvocationError::Timeout(budget.total()).into());
        }

        let started = Instant::now();
        let output = self
            .model
            .invoke(kind, &payload, remaining)
            .await
            .map_err(|err| {
                tracing::error!(operation = %kind, error = %err, "Model invocation failed");
                AppError::from(err)
            })?;
        tracing::debug!(
            operation = %kind,
            elapsed_ms = started.elapsed().as_millis() as u64,
            remaining_ms = budget.remaining().as_millis() as u64,
            "Model invocation completed"
        );
        Ok(output)
    }

    /// Optional extra call (regeneration, second attempt, fallback scoring).
    ///
    /// Skipped when the budget is spent; failures are logged and reported as
    /// `None` so the handler can finish from its deterministic fallback.
    pub async fn follow_up(
        &self,
        budget: &ModelBudget,
        kind: OperationKind,
        payload: ModelPayload,
    ) -> Option<ModelOutput> {
        if budget.is_spent() {
            tracing::warn!(operation = %kind, "Request budget spent, skipping follow-up model call");
            return None;
        }
        match self.invoke(budget, kind, payload).await {
            Ok(output) => Some(output),
            Err(err) => {
                tracing::warn!(operation = %kind, error = %err, "Follow-up model call failed");
                None
            }
        }
    }
}

/// Model-wait budget shared by every model call made for one request.
#[derive(Debug, Clone, Copy)]
pub struct ModelBudget {
    deadline: Instant,
    total: Duration,
}

impl ModelBudget {
    pub fn new(total: Duration) -> Self {
        Self {
            deadline: Instant::now() + total,
            total,
        }
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_spent(&self) -> bool {
        self.remaining().is_zero()
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.uploads.max_file_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health::health_check).fallback(not_found))
        .route("/api/ai/detect", post(detect::detect_content).fallback(not_found))
        .route("/api/generate/article", post(generate::generate_article).fallback(not_found))
        .route("/api/generate/titles", post(generate::generate_titles).fallback(not_found))
        .route("/api/generate/quotes", post(generate::generate_quotes).fallback(not_found))
        .route("/api/generate/rewrite", post(generate::rewrite_text).fallback(not_found))
        .route("/api/classify/ticket", post(classify::classify_ticket).fallback(not_found))
        .route("/api/classify/resume", post(classify::analyze_resume).fallback(not_found))
        .route("/api/classify/sentiment", post(classify::analyze_sentiment).fallback(not_found))
        .route("/api/assistant/respond", post(assistant::respond_assistant).fallback(not_found))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::NotFound(format!("No operation at {method} {}", uri.path()))
}
