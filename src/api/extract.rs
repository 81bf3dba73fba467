// INPUT NORMALIZATION: JSON bodies and multipart uploads
//
// Every rejection raised while reading a request becomes
// `AppError::Validation`, so callers always get a 400 envelope naming the
// offending field instead of axum's default plain-text rejection.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Multipart, Request, multipart::MultipartError},
};
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer};

use super::document::{extract_text, DocumentKind};
use super::AppState;
use crate::errors::AppError;
use crate::text::count_words;

/// Field-level checks run after deserialization.
pub trait Validate {
    fn validate(&self) -> Result<(), AppError>;
}

/// `Json<T>` that maps rejections to `ValidationError` and runs [`Validate`].
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

pub fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} is required and cannot be empty")));
    }
    Ok(())
}

pub fn require_max_words(field: &str, value: &str, max: usize) -> Result<(), AppError> {
    if count_words(value) > max {
        return Err(AppError::Validation(format!(
            "{field} is too long. Maximum {max} words allowed"
        )));
    }
    Ok(())
}

/// Validates a requested item count and converts it to `usize`.
pub fn require_count(field: &str, value: i64, max: i64) -> Result<usize, AppError> {
    if value <= 0 {
        return Err(AppError::Validation(format!("{field} must be greater than 0")));
    }
    if value > max {
        return Err(AppError::Validation(format!("{field} must not exceed {max}")));
    }
    Ok(value as usize)
}

/// Integer as JSON number or numeric string (`5`, `5.0`, `"5"`).
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientInt {
    Int(i64),
    Float(f64),
    Text(String),
}

impl LenientInt {
    fn into_i64<E: de::Error>(self) -> Result<i64, E> {
        match self {
            LenientInt::Int(value) => Ok(value),
            LenientInt::Float(value) if value.is_finite() && value.fract() == 0.0 => Ok(value as i64),
            LenientInt::Float(value) => Err(E::custom(format!("expected a whole number, got {value}"))),
            LenientInt::Text(text) => text
                .trim()
                .parse::<i64>()
                .map_err(|_| E::custom(format!("expected a whole number, got \"{text}\""))),
        }
    }
}

pub fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    LenientInt::deserialize(deserializer)?.into_i64()
}

pub fn lenient_opt_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Option::<LenientInt>::deserialize(deserializer)?
        .map(LenientInt::into_i64)
        .transpose()
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn mime(&self) -> &str {
        self.content_type.as_deref().unwrap_or("application/octet-stream")
    }

    /// Text of the uploaded document (plain text, PDF, DOCX or DOC).
    pub async fn document_text(&self) -> Result<String, AppError> {
        let kind = DocumentKind::detect(self.mime(), &self.file_name).ok_or_else(|| {
            let essence = self.mime().split(';').next().unwrap_or_default().trim();
            AppError::Validation(format!(
                "Unsupported file type: {essence}. Allowed: PDF, DOC, DOCX, TXT"
            ))
        })?;
        let text = extract_text(kind, self.bytes.clone()).await?;
        tracing::debug!(
            kind = kind.label(),
            file_name = %self.file_name,
            chars = text.chars().count(),
            "Extracted document text"
        );
        Ok(text)
    }
}

/// Parsed multipart body: the `file` part plus plain form fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn take_file(&mut self) -> Result<UploadedFile, AppError> {
        match self.file.take() {
            Some(file) if !file.bytes.is_empty() => Ok(file),
            Some(_) => Err(AppError::Validation("Uploaded file is empty".to_string())),
            None => Err(AppError::Validation(
                "File upload is required under the `file` field".to_string(),
            )),
        }
    }

    pub fn require_field(&self, name: &str) -> Result<String, AppError> {
        let value = self.fields.get(name).map(|v| v.trim()).unwrap_or_default();
        require_text(name, value)?;
        Ok(value.to_string())
    }
}

fn human_size(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else if bytes >= 1024 {
        format!("{}KB", bytes / 1024)
    } else {
        format!("{bytes} bytes")
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::Validation(format!("Invalid multipart body: {}", err.body_text()))
}

#[axum::async_trait]
impl FromRequest<AppState> for UploadForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        let max_bytes = state.config.uploads.max_file_bytes;
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let file_name = field.file_name().map(str::to_string);

            if file_name.is_none() && name != "file" {
                let value = field.text().await.map_err(multipart_error)?;
                form.fields.insert(name, value);
                continue;
            }

            if name != "file" {
                return Err(AppError::Validation(format!(
                    "Unexpected file field `{name}`. Upload the document under `file`"
                )));
            }
            if form.file.is_some() {
                return Err(AppError::Validation("Only one file may be uploaded".to_string()));
            }

            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(multipart_error)?;
            if bytes.len() > max_bytes {
                return Err(AppError::Validation(format!(
                    "File size exceeds {} limit",
                    human_size(max_bytes)
                )));
            }
            form.file = Some(UploadedFile {
                file_name: file_name.unwrap_or_else(|| "upload.txt".to_string()),
                content_type,
                bytes,
            });
        }

        tracing::debug!(
            has_file = form.file.is_some(),
            fields = ?form.fields.keys().collect::<Vec<_>>(),
            "Parsed multipart form"
        );
        Ok(form)
    }
}
