use std::collections::HashSet;

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::envelope::{ensure, ensure_items, ensure_text, ensure_unit, respond, ApiResponse, ResponseContract};
use super::extract::{require_max_words, require_text, UploadForm, Validate, ValidatedJson};
use super::AppState;
use crate::errors::AppError;
use crate::models::local::keyword_label_scores;
use crate::models::{
    ChatMessage, Completion, GenerationParams, LabelScore, ModelPayload, OperationKind, OutputSource,
};
use crate::text::{
    clamp_unit, content_terms, count_words, extract_json_object, round_to, top_terms,
};

const MAX_CLASSIFY_WORDS: usize = 5000;
const TICKET_PROMPT_CHARS: usize = 4000;
const RESUME_PROMPT_CHARS: usize = 3500;
const MIN_RESUME_CHARS: usize = 50;
const MAX_INSIGHT_ITEMS: usize = 6;
const RESUME_ATTEMPTS: usize = 2;

fn prefix_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn lowercase_tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// True when any single-word term is a token of `text` or any phrase is a substring.
fn mentions_any(text: &str, terms: &[&str]) -> bool {
    let lower = text.to_lowercase();
    let tokens = lowercase_tokens(text);
    terms.iter().any(|term| {
        if term.contains(' ') {
            lower.contains(term)
        } else {
            tokens.contains(*term)
        }
    })
}

/// Case-insensitive match of `value` against `allowed`, returning the canonical spelling.
fn canonical<'a>(value: &str, allowed: &[&'a str]) -> Option<&'a str> {
    let value = value.trim();
    allowed.iter().copied().find(|candidate| candidate.eq_ignore_ascii_case(value))
}

// ============================================================================
// Ticket classification
// ============================================================================

pub const DEPARTMENTS: &[&str] = &[
    "Engineering",
    "Product",
    "Customer Success",
    "Finance",
    "Security",
    "DevOps",
    "Data",
    "Design",
    "Sales",
];

pub const TICKET_SENTIMENTS: &[&str] = &["Urgent", "Negative", "Neutral", "Positive"];

/// Categories scored by the zero-shot fallback, each with its owning department.
const FALLBACK_CATEGORIES: &[(&str, &str)] = &[
    ("Payment Processing Failure", "Finance"),
    ("Feature Request", "Product"),
    ("Authentication Problem", "Security"),
    ("Data Loss", "Engineering"),
    ("Performance Degradation", "DevOps"),
    ("Network Connectivity", "DevOps"),
    ("Bug Report", "Engineering"),
    ("Account Access", "Customer Success"),
    ("Configuration Help", "Customer Success"),
];

const GENERIC_KEYWORDS: &[&str] = &["issue", "issues", "need", "problem", "help", "please", "thing"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" | "urgent" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" | "normal" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// Priority implied by the wording of the ticket.
    pub fn infer(text: &str) -> Self {
        if mentions_any(text, &["outage", "breach", "hacked", "compromised", "data loss", "security incident"]) {
            Priority::Critical
        } else if mentions_any(
            text,
            &["crash", "crashed", "crashes", "failed", "failing", "down", "error", "unable", "cannot", "can't"],
        ) {
            Priority::High
        } else if mentions_any(text, &["would like", "feature request", "suggestion", "can you add", "nice to have"]) {
            Priority::Low
        } else {
            Priority::Medium
        }
    }

    pub fn response_time(&self) -> &'static str {
        match self {
            Priority::Critical => "Within 1 hour",
            Priority::High => "Within 4 hours",
            Priority::Medium => "Within 24 hours",
            Priority::Low => "Within 48 hours",
        }
    }
}

fn infer_ticket_sentiment(text: &str) -> &'static str {
    if mentions_any(text, &["urgent", "urgently", "asap", "immediately", "right now", "emergency"]) {
        "Urgent"
    } else if mentions_any(
        text,
        &["frustrated", "angry", "terrible", "disappointed", "unacceptable", "annoyed", "awful"],
    ) {
        "Negative"
    } else if mentions_any(text, &["thanks", "thank", "love", "great", "appreciate"]) {
        "Positive"
    } else {
        "Neutral"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    pub text: String,
    pub email: Option<String>,
    pub user_id: Option<String>,
}

impl Validate for TicketRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_text("text", &self.text)?;
        require_max_words("text", &self.text, MAX_CLASSIFY_WORDS)?;
        if let Some(email) = self.email.as_deref().map(str::trim) {
            if !email.is_empty() && !email.contains('@') {
                return Err(AppError::Validation("email must be a valid email address".to_string()));
            }
        }
        Ok(())
    }
}

/// Classification as the model returned it; every field may be absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawClassification {
    pub category: Option<String>,
    pub priority: Option<String>,
    pub department: Option<String>,
    pub sentiment: Option<String>,
    pub estimated_response_time: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub reasoning: Option<String>,
}

pub fn parse_classification(raw: &str) -> Option<RawClassification> {
    let json = extract_json_object(raw)?;
    let parsed: RawClassification = serde_json::from_str(json).ok()?;
    let has_category = parsed.category.as_deref().is_some_and(|c| !c.trim().is_empty());
    has_category.then_some(parsed)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketMetadata {
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub text_length: usize,
    pub word_count: usize,
    pub source: OutputSource,
    pub classified_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketClassification {
    pub category: String,
    pub priority: Priority,
    pub department: String,
    pub sentiment: String,
    pub estimated_response_time: String,
    pub keywords: Vec<String>,
    pub reasoning: String,
    pub metadata: TicketMetadata,
}

impl ResponseContract for TicketClassification {
    fn check(&self) -> Result<(), String> {
        ensure_text("category", &self.category)?;
        ensure(DEPARTMENTS.contains(&self.department.as_str()), || {
            format!("department `{}` is not recognised", self.department)
        })?;
        ensure(TICKET_SENTIMENTS.contains(&self.sentiment.as_str()), || {
            format!("sentiment `{}` is not recognised", self.sentiment)
        })?;
        ensure(!self.keywords.is_empty(), || "keywords is empty".to_string())?;
        ensure_items("keywords", &self.keywords)?;
        ensure_text("reasoning", &self.reasoning)
    }
}

/// 3 to 7 lowercase keywords, topped up from the ticket text when the model gave too few.
fn ticket_keywords(model_keywords: &[String], text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords: Vec<String> = model_keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty() && !GENERIC_KEYWORDS.contains(&k.as_str()))
        .filter(|k| seen.insert(k.clone()))
        .take(7)
        .collect();

    if keywords.len() < 3 {
        for term in top_terms(text, 7) {
            if keywords.len() >= 5 {
                break;
            }
            if !GENERIC_KEYWORDS.contains(&term.as_str()) && seen.insert(term.clone()) {
                keywords.push(term);
            }
        }
    }
    if keywords.is_empty() {
        keywords.push("support".to_string());
    }
    keywords
}

/// Merge model output with heuristics so every field is populated and valid.
pub fn normalize_classification(raw: RawClassification, text: &str, metadata: TicketMetadata) -> TicketClassification {
    let category = raw
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or("General Inquiry")
        .to_string();
    let priority = raw
        .priority
        .as_deref()
        .and_then(Priority::parse)
        .unwrap_or_else(|| Priority::infer(text));
    let department = raw
        .department
        .as_deref()
        .and_then(|d| canonical(d, DEPARTMENTS))
        .unwrap_or("Customer Success")
        .to_string();
    let sentiment = raw
        .sentiment
        .as_deref()
        .and_then(|s| canonical(s, TICKET_SENTIMENTS))
        .unwrap_or_else(|| infer_ticket_sentiment(text))
        .to_string();
    let keywords = ticket_keywords(&raw.keywords, text);
    let reasoning = raw
        .reasoning
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or("Classified from the ticket content")
        .to_string();
    TicketClassification {
        category,
        priority,
        department,
        sentiment,
        estimated_response_time: priority.response_time().to_string(),
        keywords,
        reasoning,
        metadata,
    }
}

/// Zero-shot category plus keyword heuristics, used when the model gave no usable JSON.
pub fn heuristic_classification(labels: &[LabelScore]) -> RawClassification {
    let matched = labels.iter().find_map(|l| {
        FALLBACK_CATEGORIES
            .iter()
            .find(|(c, _)| c.eq_ignore_ascii_case(l.label.trim()))
            .map(|entry| (*entry, l.score))
    });
    let ((category, department), score) =
        matched.unwrap_or((("Configuration Help", "Customer Success"), 0.0));

    RawClassification {
        category: Some(category.to_string()),
        priority: None,
        department: Some(department.to_string()),
        sentiment: None,
        estimated_response_time: None,
        keywords: Vec::new(),
        reasoning: Some(format!(
            "Heuristic fallback applied: closest category `{category}` (score {score:.2})"
        )),
    }
}

fn ticket_prompt(text: &str) -> Vec<ChatMessage> {
    let categories = FALLBACK_CATEGORIES
        .iter()
        .map(|(c, _)| *c)
        .collect::<Vec<_>>()
        .join(", ");
    vec![
        ChatMessage::system(
            "You are a senior SaaS support triage engine. Output only minified JSON, no commentary.",
        ),
        ChatMessage::user(format!(
            "TICKET:\n\"\"\"\n{}\n\"\"\"\n\n\
             Rules:\n\
             - category: a specific category such as {categories}; avoid vague words like 'Issue'.\n\
             - priority: Critical | High | Medium | Low. Critical only for outages, security breaches or irreversible data loss.\n\
             - department: one of {}.\n\
             - sentiment: Urgent | Negative | Neutral | Positive. Urgent only when urgency is explicit.\n\
             - keywords: 3 to 7 lowercase domain terms, no duplicates.\n\
             - reasoning: one sentence citing the phrase that drove the decision.\n\n\
             Schema: {{\"category\":\"...\",\"priority\":\"...\",\"department\":\"...\",\"sentiment\":\"...\",\"keywords\":[\"...\"],\"reasoning\":\"...\"}}",
            prefix_chars(text, TICKET_PROMPT_CHARS),
            DEPARTMENTS.join(", ")
        )),
    ]
}

#[tracing::instrument(skip_all, fields(operation = "classify-ticket", request_id = %Uuid::new_v4()))]
pub async fn classify_ticket(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<TicketRequest>,
) -> Result<Json<ApiResponse<TicketClassification>>, AppError> {
    tracing::info!(text_length = request.text.len(), "Received ticket classification request");

    let budget = state.budget();
    let params = GenerationParams::new(500, 0.2).with_top_p(0.9);
    let completion = state
        .invoke(
            &budget,
            OperationKind::ClassifyTicket,
            ModelPayload::chat(ticket_prompt(&request.text), params),
        )
        .await?
        .into_completion()?;

    let parsed = completion
        .is_usable()
        .then(|| parse_classification(&completion.text))
        .flatten();
    let (raw, source) = match parsed {
        Some(raw) => (raw, OutputSource::Model),
        None => {
            tracing::warn!("Model returned no usable classification JSON, fallback engaged");
            let categories: Vec<String> = FALLBACK_CATEGORIES.iter().map(|(c, _)| c.to_string()).collect();
            let payload = ModelPayload::ZeroShot {
                text: request.text.clone(),
                labels: categories.clone(),
            };
            let labels = match state.follow_up(&budget, OperationKind::ClassifyTicket, payload).await {
                Some(output) => output.into_labels()?,
                None => keyword_label_scores(&request.text, &categories),
            };
            (heuristic_classification(&labels), OutputSource::Fallback)
        }
    };

    let metadata = TicketMetadata {
        user_id: request.user_id.clone(),
        email: request.email.as_deref().map(str::trim).filter(|e| !e.is_empty()).map(str::to_string),
        text_length: request.text.chars().count(),
        word_count: count_words(&request.text),
        source,
        classified_at: chrono::Utc::now().to_rfc3339(),
    };
    let data = normalize_classification(raw, &request.text, metadata);
    tracing::info!(
        category = %data.category,
        priority = ?data.priority,
        source = ?source,
        "Ticket classified"
    );
    respond("Ticket classified successfully", data)
}

// ============================================================================
// Resume analysis
// ============================================================================

const DEFAULT_STRENGTHS: &[&str] = &[
    "Led cross-functional delivery initiatives",
    "Improved operational efficiency through process refinement",
    "Implemented scalable solutions aligned with strategic goals",
    "Collaborated across teams to accelerate outcomes",
];

const DEFAULT_WEAKNESSES: &[&str] = &[
    "Limited quantifiable impact metrics",
    "Scope of leadership unclear in several projects",
    "Missing clarity on budget or cost ownership",
    "Few references to stakeholder alignment",
];

const DEFAULT_SKILL_GAPS: &[&str] = &[
    "Advanced data-driven decision making",
    "End-to-end performance benchmarking",
    "Formal risk management framework",
    "Cost optimization strategies",
];

const DEFAULT_ATS_KEYWORDS: &[&str] = &["leadership", "automation", "scalability", "optimization", "integration"];

const DEFAULT_ALIGNMENT: &str = "The candidate shows partial alignment with the role; more quantified impact and a clearer leadership scope would strengthen the fit.";
const DEFAULT_PRIORITY_ACTION: &str =
    "Add quantified outcome metrics (for example % performance gains or revenue impact) to major accomplishments.";
const DEFAULT_NEXT_STEP: &str = "Rewrite achievement bullets to open with action verbs and measurable outcomes, and make leadership scope and cross-functional impact explicit.";

/// Pads short resume text with a role sentence until it reaches the minimum length.
pub fn expand_resume_text(text: &str, job_title: &str) -> String {
    let mut buffer = text.trim().to_string();
    let filler = format!(
        " {job_title} candidate demonstrates adaptable leadership, measurable delivery and collaborative execution."
    );
    while buffer.chars().count() < MIN_RESUME_CHARS {
        buffer.push_str(&filler);
    }
    buffer
}

/// Resume analysis as the model returned it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResumeAnalysis {
    pub overall_score: Option<Value>,
    pub experience_alignment: Option<String>,
    #[serde(default)]
    pub key_strengths: Vec<Value>,
    #[serde(default)]
    pub critical_weaknesses: Vec<Value>,
    #[serde(default)]
    pub skill_gaps: Vec<Value>,
    #[serde(default)]
    pub ats_keywords: Vec<Value>,
    pub top_priority_action: Option<String>,
    pub next_step_advice: Option<String>,
}

pub fn parse_resume_analysis(raw: &str) -> Option<RawResumeAnalysis> {
    let json = extract_json_object(raw)?;
    serde_json::from_str(json).ok()
}

fn score_from(value: Option<&Value>) -> Option<u8> {
    let number = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then(|| number.round().clamp(0.0, 100.0) as u8)
}

/// Trimmed, de-duplicated, capped list; `defaults` when nothing survives.
fn sanitize_items(values: &[Value], defaults: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let items: Vec<String> = values
        .iter()
        .filter_map(|value| match value {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|item| !item.is_empty())
        .filter(|item| seen.insert(item.to_lowercase()))
        .take(MAX_INSIGHT_ITEMS)
        .collect();
    if items.is_empty() {
        defaults.iter().take(MAX_INSIGHT_ITEMS).cloned().collect()
    } else {
        items
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn non_empty_or(value: Option<&str>, default: &str) -> String {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
        .to_string()
}

fn ats_defaults(resume: &str) -> Vec<String> {
    let inferred = top_terms(resume, 8);
    if inferred.is_empty() {
        owned(DEFAULT_ATS_KEYWORDS)
    } else {
        inferred
    }
}

/// Score from how many role terms the resume mentions, plus a small length bonus.
pub fn heuristic_resume_score(resume: &str, job_title: &str) -> u8 {
    let resume_terms: HashSet<String> = content_terms(resume).into_iter().collect();
    let title_terms: HashSet<String> = content_terms(job_title).into_iter().collect();
    let coverage = if title_terms.is_empty() {
        0.5
    } else {
        title_terms.iter().filter(|t| resume_terms.contains(*t)).count() as f64 / title_terms.len() as f64
    };
    let length_bonus = (count_words(resume) as f64 / 10.0).min(30.0);
    (10.0 + coverage * 60.0 + length_bonus).round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMetadata {
    pub job_title: String,
    pub file_name: String,
    pub source: OutputSource,
    pub analyzed_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeInsights {
    pub overall_score: u8,
    pub experience_alignment: String,
    pub key_strengths: Vec<String>,
    pub critical_weaknesses: Vec<String>,
    pub skill_gaps: Vec<String>,
    pub ats_keywords: Vec<String>,
    pub top_priority_action: String,
    pub next_step_advice: String,
    pub metadata: ResumeMetadata,
}

impl ResponseContract for ResumeInsights {
    fn check(&self) -> Result<(), String> {
        ensure(self.overall_score <= 100, || "overallScore exceeds 100".to_string())?;
        ensure_text("experienceAlignment", &self.experience_alignment)?;
        ensure_text("topPriorityAction", &self.top_priority_action)?;
        ensure_text("nextStepAdvice", &self.next_step_advice)?;
        for (field, items) in [
            ("keyStrengths", &self.key_strengths),
            ("criticalWeaknesses", &self.critical_weaknesses),
            ("skillGaps", &self.skill_gaps),
            ("atsKeywords", &self.ats_keywords),
        ] {
            ensure(!items.is_empty() && items.len() <= MAX_INSIGHT_ITEMS, || {
                format!("{field} must hold 1 to {MAX_INSIGHT_ITEMS} items")
            })?;
            ensure_items(field, items)?;
        }
        Ok(())
    }
}

pub fn build_insights(
    raw: Option<RawResumeAnalysis>,
    resume: &str,
    job_title: &str,
    file_name: &str,
) -> ResumeInsights {
    let source = if raw.is_some() { OutputSource::Model } else { OutputSource::Fallback };
    let raw = raw.unwrap_or_default();
    let overall_score = score_from(raw.overall_score.as_ref())
        .unwrap_or_else(|| heuristic_resume_score(resume, job_title));

    ResumeInsights {
        overall_score,
        experience_alignment: non_empty_or(raw.experience_alignment.as_deref(), DEFAULT_ALIGNMENT),
        key_strengths: sanitize_items(&raw.key_strengths, &owned(DEFAULT_STRENGTHS)),
        critical_weaknesses: sanitize_items(&raw.critical_weaknesses, &owned(DEFAULT_WEAKNESSES)),
        skill_gaps: sanitize_items(&raw.skill_gaps, &owned(DEFAULT_SKILL_GAPS)),
        ats_keywords: sanitize_items(&raw.ats_keywords, &ats_defaults(resume))
            .into_iter()
            .map(|k| k.to_lowercase())
            .collect(),
        top_priority_action: non_empty_or(raw.top_priority_action.as_deref(), DEFAULT_PRIORITY_ACTION),
        next_step_advice: non_empty_or(raw.next_step_advice.as_deref(), DEFAULT_NEXT_STEP),
        metadata: ResumeMetadata {
            job_title: job_title.to_string(),
            file_name: file_name.to_string(),
            source,
            analyzed_at: chrono::Utc::now().to_rfc3339(),
        },
    }
}

fn resume_prompt(resume: &str, job_title: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You are a principal talent acquisition lead. You value clarity, quantified impact, \
             leadership and ATS readiness, and you always call out gaps. \
             Respond only with JSON matching the schema, no markdown.",
        ),
        ChatMessage::user(format!(
            "Analyze this resume for the role \"{job_title}\".\n\n\
             Resume:\n\"\"\"\n{}\n\"\"\"\n\n\
             Schema: {{\"overallScore\":<0-100>,\"experienceAlignment\":\"...\",\"keyStrengths\":[\"...\"],\
             \"criticalWeaknesses\":[\"...\"],\"skillGaps\":[\"...\"],\"atsKeywords\":[\"...\"],\
             \"topPriorityAction\":\"...\",\"nextStepAdvice\":\"...\"}}\n\n\
             Never return empty arrays. Keep each array item under 150 characters.",
            prefix_chars(resume, RESUME_PROMPT_CHARS)
        )),
    ]
}

#[tracing::instrument(skip_all, fields(operation = "classify-resume", request_id = %Uuid::new_v4()))]
pub async fn analyze_resume(
    State(state): State<AppState>,
    mut form: UploadForm,
) -> Result<Json<ApiResponse<ResumeInsights>>, AppError> {
    let file = form.take_file()?;
    let job_title = form.require_field("jobTitle")?;
    let resume = expand_resume_text(&file.document_text().await?, &job_title);
    tracing::info!(
        file_name = %file.file_name,
        size = file.size(),
        job_title = %job_title,
        "Received resume analysis request"
    );

    let budget = state.budget();
    let params = GenerationParams::new(600, 0.2).with_top_p(0.9);
    let mut parsed = None;
    for attempt in 1..=RESUME_ATTEMPTS {
        let payload = ModelPayload::chat(resume_prompt(&resume, &job_title), params);
        let output = if attempt == 1 {
            state.invoke(&budget, OperationKind::ClassifyResume, payload).await?
        } else {
            match state.follow_up(&budget, OperationKind::ClassifyResume, payload).await {
                Some(output) => output,
                None => break,
            }
        };
        let completion: Completion = output.into_completion()?;
        if !completion.is_usable() {
            break;
        }
        parsed = parse_resume_analysis(&completion.text);
        if parsed.is_some() {
            break;
        }
        tracing::warn!(attempt, "Resume analysis was not valid JSON");
    }

    let data = build_insights(parsed, &resume, &job_title, &file.file_name);
    tracing::info!(score = data.overall_score, source = ?data.metadata.source, "Resume analyzed");
    respond("Resume analyzed successfully", data)
}

// ============================================================================
// Sentiment
// ============================================================================

pub const SENTIMENT_LABELS: &[&str] = &["Very Positive", "Positive", "Neutral", "Negative", "Very Negative"];

#[derive(Debug, Deserialize)]
pub struct SentimentRequest {
    pub text: String,
}

impl Validate for SentimentRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_text("text", &self.text)?;
        require_max_words("text", &self.text, MAX_CLASSIFY_WORDS)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentData {
    pub label: String,
    pub confidence: f64,
    pub scores: Vec<LabelScore>,
    pub analyzed_at: String,
}

impl ResponseContract for SentimentData {
    fn check(&self) -> Result<(), String> {
        ensure(SENTIMENT_LABELS.contains(&self.label.as_str()), || {
            format!("label `{}` is not a sentiment label", self.label)
        })?;
        ensure_unit("confidence", self.confidence)?;
        self.scores
            .iter()
            .try_for_each(|s| ensure_unit(&format!("scores.{}", s.label), s.score))
    }
}

/// Canonical sentiment scores, keeping only known labels; lexicon scores when none survive.
pub fn sentiment_scores(text: &str, labels: Vec<LabelScore>) -> Vec<LabelScore> {
    let mut seen = HashSet::new();
    let mut scores: Vec<LabelScore> = labels
        .into_iter()
        .filter_map(|l| {
            canonical(&l.label, SENTIMENT_LABELS).map(|label| LabelScore {
                label: label.to_string(),
                score: round_to(clamp_unit(l.score), 4),
            })
        })
        .filter(|l| seen.insert(l.label.clone()))
        .collect();

    if scores.is_empty() {
        let labels: Vec<String> = SENTIMENT_LABELS.iter().map(|l| l.to_string()).collect();
        scores = keyword_label_scores(text, &labels);
    }
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores
}

#[tracing::instrument(skip_all, fields(operation = "classify-sentiment", request_id = %Uuid::new_v4()))]
pub async fn analyze_sentiment(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<SentimentRequest>,
) -> Result<Json<ApiResponse<SentimentData>>, AppError> {
    tracing::info!(text_length = request.text.len(), "Received sentiment request");

    let labels = state
        .invoke(
            &state.budget(),
            OperationKind::ClassifySentiment,
            ModelPayload::ZeroShot {
                text: request.text.clone(),
                labels: SENTIMENT_LABELS.iter().map(|l| l.to_string()).collect(),
            },
        )
        .await?
        .into_labels()?;

    let scores = sentiment_scores(&request.text, labels);
    let (label, confidence) = scores
        .first()
        .map(|top| (top.label.clone(), top.score))
        .unwrap_or_else(|| ("Neutral".to_string(), 0.0));

    let data = SentimentData {
        label,
        confidence,
        scores,
        analyzed_at: chrono::Utc::now().to_rfc3339(),
    };
    respond("Sentiment analyzed successfully", data)
}
