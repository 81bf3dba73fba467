// ARCHITECTURE: Model Invocation Contract
//
// Every backend (remote inference API, local heuristics, test doubles) sits
// behind `ModelClient`. Handlers describe what they need with an
// `OperationKind` plus a `ModelPayload`, and receive a typed `ModelOutput`.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{InvocationError, Result};

/// The nine operations exposed over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Detect,
    GenerateArticle,
    GenerateTitles,
    GenerateQuotes,
    Rewrite,
    ClassifyTicket,
    ClassifyResume,
    ClassifySentiment,
    DocumentQa,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Detect => "detect",
            OperationKind::GenerateArticle => "generate-article",
            OperationKind::GenerateTitles => "generate-titles",
            OperationKind::GenerateQuotes => "generate-quotes",
            OperationKind::Rewrite => "rewrite",
            OperationKind::ClassifyTicket => "classify-ticket",
            OperationKind::ClassifyResume => "classify-resume",
            OperationKind::ClassifySentiment => "classify-sentiment",
            OperationKind::DocumentQa => "document-qa",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }
}

/// Sampling parameters for chat completions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            temperature: 0.7,
            top_p: 0.95,
        }
    }
}

impl GenerationParams {
    pub fn new(max_tokens: usize, temperature: f32) -> Self {
        Self { max_tokens, temperature, ..Self::default() }
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }
}

/// Normalized input handed to a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelPayload {
    /// Score how likely `text` is machine-written.
    DetectAi { text: String },
    /// Free-form chat completion.
    Chat {
        messages: Vec<ChatMessage>,
        params: GenerationParams,
    },
    /// Score each candidate label against `text`.
    ZeroShot { text: String, labels: Vec<String> },
}

impl ModelPayload {
    pub fn chat(messages: Vec<ChatMessage>, params: GenerationParams) -> Self {
        ModelPayload::Chat { messages, params }
    }

    pub fn prompt(prompt: impl Into<String>, params: GenerationParams) -> Self {
        ModelPayload::Chat {
            messages: vec![ChatMessage::user(prompt)],
            params,
        }
    }
}

/// Where a piece of output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSource {
    /// A real model produced it.
    Model,
    /// The offline backend synthesized a placeholder; handlers substitute their own output.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionScores {
    pub ai_probability: f64,
    pub human_probability: f64,
    pub source: OutputSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub source: OutputSource,
}

impl Completion {
    pub fn is_usable(&self) -> bool {
        self.source == OutputSource::Model && !self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Typed result of one model call.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Detection(DetectionScores),
    Completion(Completion),
    Labels(Vec<LabelScore>),
}

impl ModelOutput {
    fn kind_name(&self) -> &'static str {
        match self {
            ModelOutput::Detection(_) => "detection",
            ModelOutput::Completion(_) => "completion",
            ModelOutput::Labels(_) => "labels",
        }
    }

    pub fn into_detection(self) -> Result<DetectionScores> {
        match self {
            ModelOutput::Detection(scores) => Ok(scores),
            other => Err(InvocationError::UnexpectedOutput {
                expected: "detection",
                actual: other.kind_name(),
            }),
        }
    }

    pub fn into_completion(self) -> Result<Completion> {
        match self {
            ModelOutput::Completion(completion) => Ok(completion),
            other => Err(InvocationError::UnexpectedOutput {
                expected: "completion",
                actual: other.kind_name(),
            }),
        }
    }

    /// Label scores sorted by descending score.
    pub fn into_labels(self) -> Result<Vec<LabelScore>> {
        match self {
            ModelOutput::Labels(mut scores) => {
                scores.sort_by(|a, b| b.score.total_cmp(&a.score));
                Ok(scores)
            }
            other => Err(InvocationError::UnexpectedOutput {
                expected: "labels",
                actual: other.kind_name(),
            }),
        }
    }
}

/// Uniform interface to any generative or classification backend.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one model call. `timeout` is the budget the caller is willing to wait;
    /// implementations that talk to the network should pass it down to their transport.
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &ModelPayload,
        timeout: Duration,
    ) -> Result<ModelOutput>;

    /// Short backend name for logs and the health endpoint.
    fn name(&self) -> &str;
}

/// Shared handle used by the HTTP layer
pub type SharedModelClient = std::sync::Arc<dyn ModelClient>;
