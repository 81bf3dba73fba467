pub mod huggingface;
pub mod local;
pub mod retry;
pub mod traits;

pub use huggingface::HuggingFaceClient;
pub use local::LocalModel;
pub use retry::{RetryPolicy, RetryingClient};
pub use traits::{
    ChatMessage, ChatRole, Completion, DetectionScores, GenerationParams, LabelScore,
    ModelClient, ModelOutput, ModelPayload, OperationKind, OutputSource, SharedModelClient,
};

use std::sync::Arc;

use crate::config::ModelConfig;

/// Build the backend chain used by the HTTP layer.
///
/// With an API key the remote Hugging Face client is used, otherwise the
/// deterministic local model. Either way calls go through the retry decorator.
pub fn build_model_client(config: &ModelConfig) -> crate::error::Result<SharedModelClient> {
    let backend: SharedModelClient = match &config.api_key {
        Some(key) => {
            tracing::info!(
                detector = %config.detector_model,
                generator = %config.generation_model,
                "🤗 Using Hugging Face inference backend"
            );
            Arc::new(HuggingFaceClient::new(key.clone(), config)?)
        }
        None => {
            tracing::warn!("⚠️  HUGGINGFACE_API_KEY not set, serving from local fallback model");
            Arc::new(LocalModel::new())
        }
    };

    let policy = RetryPolicy {
        max_retries: config.max_retries,
        base_backoff: config.retry_backoff(),
    };
    tracing::info!(
        max_retries = policy.max_retries,
        backoff_ms = policy.base_backoff.as_millis() as u64,
        timeout_secs = config.timeout_secs,
        "Model retry policy configured"
    );

    Ok(Arc::new(RetryingClient::new(backend, policy)))
}
