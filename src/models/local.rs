// OFFLINE BACKEND: LocalModel
//
// Deterministic stand-in used when no inference API key is configured.
// Detection and label scoring use lightweight text statistics; chat
// completions come back marked `OutputSource::Fallback` so handlers replace
// them with their own template output.

use std::time::Duration;

use async_trait::async_trait;

use super::traits::{
    ChatMessage, Completion, DetectionScores, LabelScore, ModelClient, ModelOutput, ModelPayload,
    OperationKind, OutputSource,
};
use crate::error::Result;
use crate::text::{clamp_unit, count_words, round_to, sentences};

const POSITIVE_WORDS: &[&str] = &[
    "amazing", "awesome", "beautiful", "best", "brilliant", "delighted", "enjoy", "excellent",
    "fantastic", "glad", "good", "great", "happy", "helpful", "impressed", "love", "loved",
    "nice", "perfect", "pleased", "recommend", "satisfied", "thank", "thanks", "wonderful",
];

const NEGATIVE_WORDS: &[&str] = &[
    "angry", "annoyed", "awful", "bad", "broken", "crash", "disappointed", "disappointing",
    "fail", "failed", "frustrated", "hate", "horrible", "poor", "problem", "refund", "sad",
    "slow", "terrible", "unable", "unhappy", "useless", "worse", "worst", "wrong",
];

const INTENSIFIERS: &[&str] = &["absolutely", "extremely", "really", "so", "totally", "very"];

#[derive(Debug, Default, Clone)]
pub struct LocalModel;

impl LocalModel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ModelClient for LocalModel {
    async fn invoke(
        &self,
        kind: OperationKind,
        payload: &ModelPayload,
        _timeout: Duration,
    ) -> Result<ModelOutput> {
        tracing::debug!(operation = %kind, "Serving request from local fallback model");
        Ok(match payload {
            ModelPayload::DetectAi { text } => ModelOutput::Detection(heuristic_detection(text)),
            ModelPayload::ZeroShot { text, labels } => {
                ModelOutput::Labels(keyword_label_scores(text, labels))
            }
            ModelPayload::Chat { messages, .. } => ModelOutput::Completion(fallback_completion(messages)),
        })
    }

    fn name(&self) -> &str {
        "local-fallback"
    }
}

/// AI-likelihood from sentence length and vocabulary repetition.
pub fn heuristic_detection(text: &str) -> DetectionScores {
    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    let unique = words.iter().collect::<std::collections::HashSet<_>>().len();
    let unique_ratio = if words.is_empty() {
        0.0
    } else {
        unique as f64 / words.len() as f64
    };
    let sentence_count = sentences(text).len().max(1);
    let avg_sentence_length = words.len() as f64 / sentence_count as f64;

    let ai_probability = round_to(
        clamp_unit(0.35 + avg_sentence_length * 0.01 - unique_ratio * 0.2),
        4,
    );
    DetectionScores {
        ai_probability,
        human_probability: round_to(clamp_unit(1.0 - ai_probability), 4),
        source: OutputSource::Fallback,
    }
}

/// Relevance of each label to `text` in [0, 1].
///
/// Sentiment-style labels are scored against a polarity lexicon; any other
/// label by the share of its words that appear in the text.
pub fn keyword_label_scores(text: &str, labels: &[String]) -> Vec<LabelScore> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let polarity = polarity(&tokens);

    let mut scores: Vec<LabelScore> = labels
        .iter()
        .map(|label| {
            let score = match sentiment_target(label) {
                Some(target) => 1.0 - (polarity - target).abs() / 2.0,
                None => overlap_score(&tokens, label),
            };
            LabelScore {
                label: label.clone(),
                score: round_to(clamp_unit(score), 4),
            }
        })
        .collect();
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

fn polarity(tokens: &[&str]) -> f64 {
    let mut positive: f64 = 0.0;
    let mut negative: f64 = 0.0;
    let mut boost: f64 = 1.0;
    for token in tokens {
        if INTENSIFIERS.contains(token) {
            boost = 2.0;
            continue;
        }
        if POSITIVE_WORDS.contains(token) {
            positive += boost;
        } else if NEGATIVE_WORDS.contains(token) {
            negative += boost;
        }
        boost = 1.0;
    }
    let total = positive + negative;
    if total == 0.0 {
        return 0.0;
    }
    // Damped so a single weak hit lands on the mild labels.
    (positive - negative) / (total + 1.0) * (total.min(4.0) / 2.0).max(1.0)
}

fn sentiment_target(label: &str) -> Option<f64> {
    match label.trim().to_lowercase().as_str() {
        "very positive" => Some(1.0),
        "positive" => Some(0.5),
        "neutral" => Some(0.0),
        "negative" => Some(-0.5),
        "very negative" => Some(-1.0),
        _ => None,
    }
}

fn overlap_score(tokens: &[&str], label: &str) -> f64 {
    let label_tokens: Vec<String> = label
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    if label_tokens.is_empty() {
        return 0.0;
    }
    let hits = label_tokens
        .iter()
        .filter(|label_token| {
            let stem: String = label_token.chars().take(5).collect();
            tokens.iter().any(|token| token.starts_with(&stem))
        })
        .count();
    hits as f64 / label_tokens.len() as f64
}

fn fallback_completion(messages: &[ChatMessage]) -> Completion {
    let joined = messages
        .iter()
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let summary: String = joined
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(320)
        .collect();
    Completion {
        text: format!(
            "This is a deterministic fallback response generated locally ({} words of context). Context: {}",
            count_words(&joined),
            summary
        ),
        source: OutputSource::Fallback,
    }
}
