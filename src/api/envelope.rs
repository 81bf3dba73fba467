use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Uniform wire wrapper for every operation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status_code: StatusCode::OK.as_u16(),
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string();
        }
        Self {
            status_code: status.as_u16(),
            message,
            data: None,
        }
    }
}

/// Output invariants a `data` payload must satisfy before it is serialized.
pub trait ResponseContract {
    fn check(&self) -> Result<(), String>;
}

/// Validate `data` against its contract and wrap it in a 200 envelope.
pub fn respond<T>(message: &str, data: T) -> Result<Json<ApiResponse<T>>, AppError>
where
    T: Serialize + ResponseContract,
{
    data.check().map_err(AppError::SchemaViolation)?;
    Ok(Json(ApiResponse::success(message, data)))
}

pub(crate) fn ensure(condition: bool, message: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(message())
    }
}

pub(crate) fn ensure_text(field: &str, value: &str) -> Result<(), String> {
    ensure(!value.trim().is_empty(), || format!("{field} is empty"))
}

pub(crate) fn ensure_unit(field: &str, value: f64) -> Result<(), String> {
    ensure((0.0..=1.0).contains(&value), || {
        format!("{field} = {value} is outside [0, 1]")
    })
}

pub(crate) fn ensure_items(field: &str, items: &[String]) -> Result<(), String> {
    ensure(items.iter().all(|item| !item.trim().is_empty()), || {
        format!("{field} contains an empty entry")
    })
}
