// REMOTE BACKEND: Hugging Face Inference API
//
// - DetectAi  -> text-classification endpoint of the detector model
// - Chat      -> OpenAI-compatible chat completions on the generation model
// - ZeroShot  -> chat prompt asking for {"labels":[...],"scores":[...]} JSON
//
// Transport failures, throttling and 5xx answers surface as retryable
// `InvocationError`s; retry and deadline policy live in `RetryingClient`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::local::{heuristic_detection, keyword_label_scores};
use super::traits::{
    ChatMessage, Completion, DetectionScores, GenerationParams, LabelScore, ModelClient,
    ModelOutput, ModelPayload, OperationKind, OutputSource,
};
use crate::config::ModelConfig;
use crate::error::{InvocationError, Result};
use crate::text::{clamp_unit, extract_json_object, round_to};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: usize,
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawLabelScore {
    label: String,
    #[serde(default)]
    score: f64,
}

#[derive(Debug, Deserialize)]
struct ZeroShotJson {
    labels: Vec<String>,
    scores: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct HuggingFaceClient {
    http: Client,
    api_key: String,
    inference_url: String,
    chat_url: String,
    detector_model: String,
    generation_model: String,
}

impl HuggingFaceClient {
    pub fn new(api_key: impl Into<String>, config: &ModelConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("ai-text-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InvocationError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            inference_url: config.inference_url.trim_end_matches('/').to_string(),
            chat_url: config.chat_url.clone(),
            detector_model: config.detector_model.clone(),
            generation_model: config.generation_model.clone(),
        })
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        timeout: Duration,
    ) -> Result<Value> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message: String = body.chars().take(300).collect();
            return Err(InvocationError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| map_transport_error(e, timeout))
    }

    async fn detect(&self, text: &str, timeout: Duration) -> Result<DetectionScores> {
        let url = format!("{}/{}", self.inference_url, self.detector_model);
        let body = serde_json::json!({ "inputs": text });
        let raw = self.post_json(&url, &body, timeout).await?;
        let scores = flatten_label_scores(raw)?;

        match detection_from_labels(&scores) {
            Some(detection) => Ok(detection),
            None => {
                tracing::warn!(
                    labels = ?scores.iter().map(|s| s.label.as_str()).collect::<Vec<_>>(),
                    "Detector returned unrecognised labels, using heuristic scores"
                );
                Ok(heuristic_detection(text))
            }
        }
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        timeout: Duration,
    ) -> Result<Completion> {
        let body = ChatCompletionRequest {
            model: &self.generation_model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };
        let raw = self.post_json(&self.chat_url, &body, timeout).await?;
        let parsed: ChatCompletionResponse = serde_json::from_value(raw)?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(Completion {
            text: text.trim().to_string(),
            source: OutputSource::Model,
        })
    }

    async fn zero_shot(
        &self,
        text: &str,
        labels: &[String],
        timeout: Duration,
    ) -> Result<Vec<LabelScore>> {
        let excerpt: String = text.chars().take(3000).collect();
        let prompt = format!(
            "You are a classifier. Rate relevance (0-1) for each label to the text. \
             Return JSON {{\"labels\":[...],\"scores\":[...]}}. Sort descending by score.\n\
             Text: \"\"\"{excerpt}\"\"\"\nLabels: {}",
            labels.join(", ")
        );
        let messages = [ChatMessage::user(prompt)];
        let params = GenerationParams::new(400, 0.2).with_top_p(0.9);
        let completion = self.chat(&messages, &params, timeout).await?;

        match parse_zero_shot(&completion.text, labels) {
            Some(scores) => Ok(scores),
            None => {
                tracing::warn!("Classifier output was not usable JSON, using keyword scoring");
                Ok(keyword_label_scores(text, labels))
            }
        }
    }
}

#[async_trait]
impl ModelClient for HuggingFaceClient {
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &ModelPayload,
        timeout: Duration,
    ) -> Result<ModelOutput> {
        tracing::debug!(operation = %kind, "Calling Hugging Face inference API");
        match payload {
            ModelPayload::DetectAi { text } => {
                self.detect(text, timeout).await.map(ModelOutput::Detection)
            }
            ModelPayload::Chat { messages, params } => {
                self.chat(messages, params, timeout).await.map(ModelOutput::Completion)
            }
            ModelPayload::ZeroShot { text, labels } => {
                self.zero_shot(text, labels, timeout).await.map(ModelOutput::Labels)
            }
        }
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> InvocationError {
    if err.is_timeout() {
        InvocationError::Timeout(timeout)
    } else {
        err.into()
    }
}

/// Text-classification answers come either as `[{..}]` or `[[{..}]]`.
fn flatten_label_scores(raw: Value) -> Result<Vec<RawLabelScore>> {
    let outer = match raw {
        Value::Array(items) => items,
        other => {
            return Err(InvocationError::MalformedResponse(format!(
                "expected a list of label scores, got {other}"
            )))
        }
    };
    let flat: Vec<Value> = outer
        .into_iter()
        .flat_map(|item| match item {
            Value::Array(inner) => inner,
            single => vec![single],
        })
        .collect();
    Ok(serde_json::from_value(Value::Array(flat))?)
}

/// Maps detector labels onto independent AI / human probabilities.
///
/// "Fake" scores AI probability and "Real" human probability, each read on its own
/// when both are present; generic `LABEL_0`/`LABEL_1` pairs treat the larger score
/// as the winning class.
fn detection_from_labels(scores: &[RawLabelScore]) -> Option<DetectionScores> {
    let find = |name: &str| {
        scores
            .iter()
            .find(|s| s.label.eq_ignore_ascii_case(name))
            .map(|s| clamp_unit(s.score))
    };

    let (ai, human) = match (find("fake"), find("real")) {
        (Some(fake), Some(real)) => (fake, real),
        (Some(fake), None) => (fake, 1.0 - fake),
        (None, Some(real)) => (1.0 - real, real),
        (None, None) => match (find("LABEL_0"), find("LABEL_1")) {
            (Some(s0), Some(s1)) if s0 >= s1 => (1.0 - s0, s0),
            (Some(_), Some(s1)) => (s1, 1.0 - s1),
            _ => return None,
        },
    };

    Some(DetectionScores {
        ai_probability: round_to(clamp_unit(ai), 4),
        human_probability: round_to(clamp_unit(human), 4),
        source: OutputSource::Model,
    })
}

/// Reads the classifier JSON, keeping only the requested labels (matched case-insensitively).
fn parse_zero_shot(raw: &str, labels: &[String]) -> Option<Vec<LabelScore>> {
    let parsed: ZeroShotJson = serde_json::from_str(extract_json_object(raw)?).ok()?;
    if parsed.labels.len() != parsed.scores.len() {
        return None;
    }
    let mut scores: Vec<LabelScore> = parsed
        .labels
        .iter()
        .zip(parsed.scores.iter())
        .filter_map(|(label, score)| {
            labels
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(label.trim()))
                .map(|canonical| LabelScore {
                    label: canonical.clone(),
                    score: round_to(clamp_unit(*score), 4),
                })
        })
        .collect();
    if scores.is_empty() {
        return None;
    }
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    Some(scores)
}
