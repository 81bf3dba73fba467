use std::time::Duration;

/// Result alias for calls into a model backend.
pub type Result<T> = std::result::Result<T, InvocationError>;

/// Failures raised by a [`ModelClient`](crate::models::ModelClient).
#[derive(Debug, thiserror::Error)]
pub enum InvocationError {
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Model backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model returned {actual} output for a {expected} request")]
    UnexpectedOutput {
        expected: &'static str,
        actual: &'static str,
    },
}

impl InvocationError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Client-side backend rejections (bad key, unknown model) are permanent;
    /// throttling and server-side failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            InvocationError::Timeout(_) | InvocationError::Transport(_) => true,
            InvocationError::Backend { status, .. } => *status == 429 || *status >= 500,
            InvocationError::MalformedResponse(_) => true,
            InvocationError::UnexpectedOutput { .. } => false,
        }
    }
}

impl From<reqwest::Error> for InvocationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            InvocationError::MalformedResponse(err.to_string())
        } else {
            InvocationError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for InvocationError {
    fn from(err: serde_json::Error) -> Self {
        InvocationError::MalformedResponse(err.to_string())
    }
}
