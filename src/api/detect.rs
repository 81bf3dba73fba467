use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::envelope::{ensure, ensure_items, ensure_text, ensure_unit, respond, ApiResponse, ResponseContract};
use super::extract::{require_max_words, require_text, Validate, ValidatedJson};
use super::AppState;
use crate::errors::AppError;
use crate::models::{DetectionScores, ModelPayload, OperationKind, OutputSource};
use crate::text::{count_words, round_to, sentences};

const MIN_WORDS: usize = 10;
const MAX_WORDS: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub text: String,
}

impl Validate for DetectRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_text("text", &self.text)?;
        if count_words(&self.text) < MIN_WORDS {
            return Err(AppError::Validation(format!(
                "text must contain at least {MIN_WORDS} words for accurate analysis"
            )));
        }
        require_max_words("text", &self.text, MAX_WORDS)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub ai_probability: f64,
    pub human_probability: f64,
    pub verdict: String,
    pub confidence: String,
}

/// Stylometric breakdown, each score on a 0-100 scale.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub sentence_complexity: u32,
    pub vocabulary_diversity: u32,
    pub natural_flow: u32,
    pub contextual_coherence: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionMetadata {
    pub text_length: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_sentence_length: f64,
    pub avg_word_length: f64,
    pub ai_probability_percent: u32,
    pub source: OutputSource,
    pub analyzed_at: String,
}

#[derive(Debug, Serialize)]
pub struct DetectionData {
    pub detection: Detection,
    pub analysis: Analysis,
    pub indicators: Vec<String>,
    pub metadata: DetectionMetadata,
}

impl ResponseContract for DetectionData {
    fn check(&self) -> Result<(), String> {
        ensure_unit("detection.aiProbability", self.detection.ai_probability)?;
        ensure_unit("detection.humanProbability", self.detection.human_probability)?;
        ensure_text("detection.verdict", &self.detection.verdict)?;
        ensure_text("detection.confidence", &self.detection.confidence)?;
        ensure_items("indicators", &self.indicators)?;
        ensure(self.metadata.ai_probability_percent <= 100, || {
            "metadata.aiProbabilityPercent exceeds 100".to_string()
        })
    }
}

struct Verdict {
    label: &'static str,
    confidence: &'static str,
    indicators: [&'static str; 4],
}

fn verdict_for(ai_probability: f64) -> Verdict {
    if ai_probability >= 0.70 {
        Verdict {
            label: "Likely AI-Generated",
            confidence: "High",
            indicators: [
                "High confidence of AI-generated patterns",
                "Consistent structural patterns detected",
                "Limited contextual variation",
                "Formulaic language style",
            ],
        }
    } else if ai_probability >= 0.40 {
        Verdict {
            label: "Possibly Mixed Content",
            confidence: "Medium",
            indicators: [
                "Mixed indicators of AI and human writing",
                "Some AI-like patterns present",
                "Moderate structural consistency",
                "Varying language complexity",
            ],
        }
    } else {
        Verdict {
            label: "Likely Human-Written",
            confidence: "High",
            indicators: [
                "Natural language variation detected",
                "Diverse sentence structures",
                "Authentic contextual flow",
                "Human-like stylistic elements",
            ],
        }
    }
}

fn percent(value: f64) -> u32 {
    value.round().clamp(0.0, 100.0) as u32
}

pub fn build_detection(text: &str, scores: DetectionScores) -> DetectionData {
    let ai = scores.ai_probability.clamp(0.0, 1.0);
    let human = scores.human_probability.clamp(0.0, 1.0);

    let words: Vec<&str> = text.split_whitespace().collect();
    let word_count = words.len().max(1);
    let sentence_count = sentences(text).len().max(1);
    let letters = words.iter().map(|w| w.chars().count()).sum::<usize>();
    let unique = words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<std::collections::HashSet<_>>()
        .len();

    let avg_sentence_length = word_count as f64 / sentence_count as f64;
    let avg_word_length = letters as f64 / word_count as f64;
    let verdict = verdict_for(ai);

    DetectionData {
        detection: Detection {
            ai_probability: round_to(ai, 4),
            human_probability: round_to(human, 4),
            verdict: verdict.label.to_string(),
            confidence: verdict.confidence.to_string(),
        },
        analysis: Analysis {
            sentence_complexity: percent(avg_sentence_length * 3.0),
            vocabulary_diversity: percent((avg_word_length - 3.0) * 20.0),
            natural_flow: percent(100.0 - ai * 80.0),
            contextual_coherence: percent(unique as f64 / word_count as f64 * 100.0),
        },
        indicators: verdict.indicators.iter().map(|s| s.to_string()).collect(),
        metadata: DetectionMetadata {
            text_length: text.chars().count(),
            word_count: words.len(),
            sentence_count,
            avg_sentence_length: round_to(avg_sentence_length, 1),
            avg_word_length: round_to(avg_word_length, 1),
            ai_probability_percent: percent(ai * 100.0),
            source: scores.source,
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        },
    }
}

#[tracing::instrument(skip_all, fields(operation = "detect", request_id = %Uuid::new_v4()))]
pub async fn detect_content(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<DetectRequest>,
) -> Result<Json<ApiResponse<DetectionData>>, AppError> {
    tracing::info!(text_length = request.text.len(), "Received detection request");

    let scores = state
        .invoke(
            &state.budget(),
            OperationKind::Detect,
            ModelPayload::DetectAi { text: request.text.clone() },
        )
        .await?
        .into_detection()?;

    let data = build_detection(&request.text, scores);
    tracing::info!(
        verdict = %data.detection.verdict,
        ai_probability = data.detection.ai_probability,
        "Detection completed"
    );
    respond("AI content detection completed successfully", data)
}
