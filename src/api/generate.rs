use std::collections::HashSet;

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::envelope::{ensure, ensure_items, ensure_text, respond, ApiResponse, ResponseContract};
use super::extract::{
    lenient_int, lenient_opt_int, require_count, require_max_words, require_text, Validate, ValidatedJson,
};
use super::AppState;
use crate::errors::AppError;
use crate::models::{ChatMessage, Completion, GenerationParams, ModelPayload, OperationKind};
use crate::text::{contains_ignore_case, count_words, list_items, sentences, title_case, truncate_words};

const DEFAULT_WORD_COUNT: i64 = 500;
const MAX_WORD_COUNT: i64 = 3000;
const MAX_LIST_COUNT: i64 = 50;
const MAX_REWRITE_WORDS: usize = 1000;
const TEMPLATE_VARIANTS: usize = 6;

// ============================================================================
// Article
// ============================================================================

/// Keywords arrive either as a comma-separated string or as a JSON array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeywordsInput {
    Csv(String),
    List(Vec<String>),
}

impl KeywordsInput {
    /// Trimmed, lowercased, de-duplicated keywords in request order.
    pub fn normalized(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            KeywordsInput::Csv(csv) => csv.split(',').collect(),
            KeywordsInput::List(list) => list.iter().map(String::as_str).collect(),
        };
        let mut seen = HashSet::new();
        raw.into_iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .filter(|k| seen.insert(k.clone()))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRequest {
    pub topic: String,
    pub keywords: Option<KeywordsInput>,
    #[serde(default, deserialize_with = "lenient_opt_int")]
    pub word_count: Option<i64>,
}

impl ArticleRequest {
    pub fn target_words(&self) -> usize {
        self.word_count.unwrap_or(DEFAULT_WORD_COUNT).max(1) as usize
    }
}

impl Validate for ArticleRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_text("topic", &self.topic)?;
        if let Some(word_count) = self.word_count {
            require_count("wordCount", word_count, MAX_WORD_COUNT)?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleData {
    pub topic: String,
    pub keywords: Vec<String>,
    pub target_word_count: usize,
    pub actual_word_count: usize,
    pub article: String,
}

impl ResponseContract for ArticleData {
    fn check(&self) -> Result<(), String> {
        ensure_text("article", &self.article)?;
        ensure(contains_ignore_case(&self.article, &self.topic), || {
            "article does not mention the topic".to_string()
        })?;
        if let Some(missing) = self
            .keywords
            .iter()
            .find(|kw| !contains_ignore_case(&self.article, kw))
        {
            return Err(format!("article is missing keyword `{missing}`"));
        }
        ensure(self.actual_word_count == count_words(&self.article), || {
            "actualWordCount does not match the article".to_string()
        })
    }
}

fn article_draft(topic: &str, keywords: &[String]) -> String {
    let focus = if keywords.is_empty() {
        "Practical frameworks and measurable outcomes sit at the center of the conversation.".to_string()
    } else {
        format!(
            "The conversation centers on {} and what they mean in day-to-day practice.",
            keywords.join(", ")
        )
    };
    format!(
        "{topic} is changing how organizations plan, build and measure their work.\n\n\
         {focus} Practitioners weigh the operational and ethical questions it raises so that adoption stays responsible.\n\n\
         Teams that invest in education and steady experimentation tend to see durable gains, \
         and they track results closely to catch unintended consequences early.\n\n\
         Looking ahead, {topic} offers real opportunities alongside the guardrails needed to use them well."
    )
}

/// Fit `body` to exactly `budget` words, padding with topic sentences when short.
fn fit_body(body: &str, topic: &str, budget: usize) -> String {
    if budget == 0 {
        return String::new();
    }
    let filler = format!("This perspective on {topic} keeps growing with new evidence and lessons from the field.");
    let mut text = body.trim().to_string();
    while count_words(&text) < budget {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(&filler);
    }
    let mut fitted = truncate_words(&text, budget).trim_end().to_string();
    if !fitted.ends_with(|c: char| matches!(c, '.' | '!' | '?')) {
        fitted = fitted.trim_end_matches(|c: char| matches!(c, ',' | ';' | ':' | '-')).to_string();
        fitted.push('.');
    }
    fitted
}

/// Lead paragraph carrying the topic and every keyword, followed by a body of
/// `target - lead` words. When the lead alone exceeds the target it is kept whole.
pub fn compose_article(topic: &str, keywords: &[String], target: usize, completion: &Completion) -> String {
    let topic = topic.trim();
    let lead = if keywords.is_empty() {
        topic.to_string()
    } else {
        format!("{topic}\n\nKey topics: {}.", keywords.join(", "))
    };

    let min_model_words = (target as f64 * 0.6).ceil() as usize;
    let body = if completion.is_usable() && count_words(&completion.text) >= min_model_words {
        completion.text.clone()
    } else {
        article_draft(topic, keywords)
    };

    let budget = target.saturating_sub(count_words(&lead));
    let body = fit_body(&body, topic, budget);
    if body.is_empty() {
        lead
    } else {
        format!("{lead}\n\n{body}")
    }
}

#[tracing::instrument(skip_all, fields(operation = "generate-article", request_id = %Uuid::new_v4()))]
pub async fn generate_article(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<ArticleRequest>,
) -> Result<Json<ApiResponse<ArticleData>>, AppError> {
    let target = request.target_words();
    let keywords = request
        .keywords
        .as_ref()
        .map(KeywordsInput::normalized)
        .unwrap_or_default();
    tracing::info!(topic = %request.topic, target, keywords = keywords.len(), "Received article request");

    let keyword_line = if keywords.is_empty() {
        String::new()
    } else {
        format!("Keywords to include: {}\n", keywords.join(", "))
    };
    let messages = vec![
        ChatMessage::system("You are a professional writer who produces well-structured long-form articles."),
        ChatMessage::user(format!(
            "Write a comprehensive article about \"{}\".\n{keyword_line}Target length: approximately {target} words.\n\nArticle:",
            request.topic.trim()
        )),
    ];
    // PERFORMANCE: ~1.5 tokens per word keeps the completion near the target
    let max_tokens = ((target as f64 * 1.5).round() as usize).clamp(64, 4096);
    let params = GenerationParams::new(max_tokens, 0.7).with_top_p(0.9);

    let completion = state
        .invoke(&state.budget(), OperationKind::GenerateArticle, ModelPayload::chat(messages, params))
        .await?
        .into_completion()?;

    let article = compose_article(&request.topic, &keywords, target, &completion);
    let data = ArticleData {
        topic: request.topic.trim().to_string(),
        actual_word_count: count_words(&article),
        keywords,
        target_word_count: target,
        article,
    };
    tracing::info!(
        actual = data.actual_word_count,
        source = ?completion.source,
        "Article generated"
    );
    respond("Article generated successfully", data)
}

// ============================================================================
// Titles and quotes
// ============================================================================

fn is_preamble(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.starts_with("here are") || lower.starts_with("here's") || lower.starts_with("sure")
}

fn parse_items(completion: &Completion) -> Vec<String> {
    if !completion.is_usable() {
        return Vec::new();
    }
    list_items(&completion.text)
        .into_iter()
        .filter(|item| !is_preamble(item))
        .collect()
}

/// Pad `items` with template output until exactly `count` unique entries exist.
/// Templates cycle through their variants, numbered once the variants run out.
pub fn fill_to_count(mut items: Vec<String>, count: usize, template: impl Fn(usize) -> String) -> Vec<String> {
    items.truncate(count);
    let mut seen: HashSet<String> = items.iter().map(|item| item.to_lowercase()).collect();
    let mut index = 0;
    while items.len() < count {
        let base = template(index % TEMPLATE_VARIANTS);
        let candidate = if index < TEMPLATE_VARIANTS {
            base
        } else {
            format!("{base} #{}", index / TEMPLATE_VARIANTS + 1)
        };
        if seen.insert(candidate.to_lowercase()) {
            items.push(candidate);
        }
        index += 1;
    }
    items
}

/// Slightly warmer sampling for the second list attempt.
fn regeneration_params(params: GenerationParams) -> GenerationParams {
    GenerationParams {
        temperature: (params.temperature + 0.1).min(1.0),
        ..params
    }
}

/// Ask for a list, regenerating once when the first answer is short and the
/// request budget still allows it.
async fn generate_list(
    state: &AppState,
    kind: OperationKind,
    prompt: String,
    params: GenerationParams,
    count: usize,
) -> Result<Vec<String>, AppError> {
    let budget = state.budget();
    let completion = state
        .invoke(&budget, kind, ModelPayload::prompt(prompt.clone(), params))
        .await?
        .into_completion()?;
    let mut items = parse_items(&completion);

    if items.len() < count && completion.is_usable() {
        tracing::info!(parsed = items.len(), wanted = count, "Model list was short, regenerating once");
        let retry_params = regeneration_params(params);
        match state.follow_up(&budget, kind, ModelPayload::prompt(prompt, retry_params)).await {
            Some(output) => {
                let completion = output.into_completion()?;
                let mut seen: HashSet<String> = items.iter().map(|i| i.to_lowercase()).collect();
                items.extend(
                    parse_items(&completion)
                        .into_iter()
                        .filter(|item| seen.insert(item.to_lowercase())),
                );
            }
            None => tracing::info!("No regeneration, filling from templates"),
        }
    }
    Ok(items)
}

#[derive(Debug, Deserialize)]
pub struct TitlesRequest {
    pub topic: String,
    pub tone: Option<String>,
    #[serde(deserialize_with = "lenient_int")]
    pub count: i64,
}

impl TitlesRequest {
    pub fn tone(&self) -> String {
        self.tone
            .as_deref()
            .map(str::trim)
            .filter(|tone| !tone.is_empty())
            .unwrap_or("professional")
            .to_string()
    }
}

impl Validate for TitlesRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_text("topic", &self.topic)?;
        require_count("count", self.count, MAX_LIST_COUNT)?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct TitlesData {
    pub topic: String,
    pub tone: String,
    pub count: usize,
    pub titles: Vec<String>,
}

impl ResponseContract for TitlesData {
    fn check(&self) -> Result<(), String> {
        ensure(self.titles.len() == self.count, || {
            format!("expected {} titles, produced {}", self.count, self.titles.len())
        })?;
        ensure_items("titles", &self.titles)
    }
}

pub fn title_template(topic: &str, tone: &str, variant: usize) -> String {
    let tone = title_case(&tone.to_lowercase());
    match variant {
        0 => format!("The {tone} Guide to {topic}"),
        1 => format!("{topic}: {tone} Lessons Learned"),
        2 => format!("{tone} Strategies for {topic}"),
        3 => format!("Why {topic} Matters: A {tone} Take"),
        4 => format!("The {tone} Playbook for {topic}"),
        _ => format!("{topic} Explained: {tone} Insights"),
    }
}

#[tracing::instrument(skip_all, fields(operation = "generate-titles", request_id = %Uuid::new_v4()))]
pub async fn generate_titles(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<TitlesRequest>,
) -> Result<Json<ApiResponse<TitlesData>>, AppError> {
    let count = request.count as usize;
    let tone = request.tone();
    let topic = request.topic.trim().to_string();
    tracing::info!(topic = %topic, tone = %tone, count, "Received titles request");

    let prompt = format!(
        "Generate {count} catchy, SEO-friendly blog titles about \"{topic}\" in a {tone} tone.\n\
         Format: one title per line, numbered.\n\nTitles:"
    );
    let params = GenerationParams::new((count * 30).clamp(120, 1500), 0.8);
    let items = generate_list(&state, OperationKind::GenerateTitles, prompt, params, count).await?;
    let parsed = items.len().min(count);

    let titles = fill_to_count(items, count, |variant| title_template(&topic, &tone, variant));
    tracing::info!(from_model = parsed, total = titles.len(), "Titles generated");

    respond(
        "Titles generated successfully",
        TitlesData { topic, tone, count, titles },
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteKind {
    #[default]
    Quote,
    Tagline,
}

impl QuoteKind {
    fn describe(&self) -> &'static str {
        match self {
            QuoteKind::Quote => "inspirational quotes",
            QuoteKind::Tagline => "brand taglines",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuotesRequest {
    pub theme: String,
    #[serde(rename = "type", default)]
    pub kind: QuoteKind,
    #[serde(deserialize_with = "lenient_int")]
    pub count: i64,
}

impl Validate for QuotesRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_text("theme", &self.theme)?;
        require_count("count", self.count, MAX_LIST_COUNT)?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct QuotesData {
    pub theme: String,
    #[serde(rename = "type")]
    pub kind: QuoteKind,
    pub count: usize,
    pub quotes: Vec<String>,
}

impl ResponseContract for QuotesData {
    fn check(&self) -> Result<(), String> {
        ensure(self.quotes.len() == self.count, || {
            format!("expected {} quotes, produced {}", self.count, self.quotes.len())
        })?;
        ensure_items("quotes", &self.quotes)
    }
}

pub fn quote_template(theme: &str, kind: QuoteKind, variant: usize) -> String {
    let lower = theme.to_lowercase();
    let titled = title_case(theme);
    match (kind, variant) {
        (QuoteKind::Quote, 0) => format!("{titled} thrives when curiosity meets consistent practice."),
        (QuoteKind::Quote, 1) => format!("Every step toward {lower} is a step toward who you want to be."),
        (QuoteKind::Quote, 2) => format!("Small acts of {lower} grow into lasting change."),
        (QuoteKind::Quote, 3) => format!("The best day to begin with {lower} is today."),
        (QuoteKind::Quote, 4) => format!("{titled} is not a destination but a daily decision."),
        (QuoteKind::Quote, _) => format!("Where there is {lower}, there is a way forward."),
        (QuoteKind::Tagline, 0) => format!("{titled}. Built for bold teams."),
        (QuoteKind::Tagline, 1) => format!("{titled}, where ideas take flight."),
        (QuoteKind::Tagline, 2) => format!("Small words, big moves: {lower}."),
        (QuoteKind::Tagline, 3) => format!("{titled}, made simple."),
        (QuoteKind::Tagline, 4) => format!("Powered by {lower}."),
        (QuoteKind::Tagline, _) => format!("{titled}. Start today."),
    }
}

#[tracing::instrument(skip_all, fields(operation = "generate-quotes", request_id = %Uuid::new_v4()))]
pub async fn generate_quotes(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<QuotesRequest>,
) -> Result<Json<ApiResponse<QuotesData>>, AppError> {
    let count = request.count as usize;
    let kind = request.kind;
    let theme = request.theme.trim().to_string();
    tracing::info!(theme = %theme, kind = ?kind, count, "Received quotes request");

    let prompt = format!(
        "Generate {count} {} about \"{theme}\".\nFormat: one per line.\n\n{}:",
        kind.describe(),
        title_case(kind.describe())
    );
    let params = GenerationParams::new((count * 40).clamp(160, 2000), 0.9);
    let items = generate_list(&state, OperationKind::GenerateQuotes, prompt, params, count).await?;

    let quotes = fill_to_count(items, count, |variant| quote_template(&theme, kind, variant));
    respond(
        "Quotes generated successfully",
        QuotesData { theme, kind, count, quotes },
    )
}

// ============================================================================
// Rewrite
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteMode {
    #[default]
    Standard,
    Formal,
    Casual,
    Creative,
    Concise,
}

impl RewriteMode {
    fn instruction(&self) -> &'static str {
        match self {
            RewriteMode::Standard => "Rewrite the following text while keeping its meaning",
            RewriteMode::Formal => "Rewrite the following text in a formal, professional tone",
            RewriteMode::Casual => "Rewrite the following text in a casual, conversational tone",
            RewriteMode::Creative => "Rewrite the following text with creative flair and engaging language",
            RewriteMode::Concise => "Rewrite the following text to be shorter and more direct",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RewriteRequest {
    pub text: String,
    #[serde(default)]
    pub mode: RewriteMode,
}

impl Validate for RewriteRequest {
    fn validate(&self) -> Result<(), AppError> {
        require_text("text", &self.text)?;
        require_max_words("text", &self.text, MAX_REWRITE_WORDS)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteData {
    pub mode: RewriteMode,
    pub original_text: String,
    pub rewritten_text: String,
    pub original_word_count: usize,
    pub rewritten_word_count: usize,
}

impl ResponseContract for RewriteData {
    fn check(&self) -> Result<(), String> {
        ensure_text("rewrittenText", &self.rewritten_text)
    }
}

const CONTRACTIONS: &[(&str, &str)] = &[
    ("can't", "cannot"),
    ("won't", "will not"),
    ("don't", "do not"),
    ("doesn't", "does not"),
    ("isn't", "is not"),
    ("aren't", "are not"),
    ("it's", "it is"),
    ("i'm", "I am"),
    ("we're", "we are"),
    ("they're", "they are"),
    ("you're", "you are"),
    ("gonna", "going to"),
    ("wanna", "want to"),
];

fn expand_contractions(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let core = word.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '\'');
            let tail = &word[core.len()..];
            let normalized = core.replace('\u{2019}', "'").to_lowercase();
            match CONTRACTIONS.iter().find(|(short, _)| *short == normalized) {
                Some((_, long)) => {
                    let expanded = if core.starts_with(char::is_uppercase) {
                        title_case(long)
                    } else {
                        long.to_string()
                    };
                    format!("{expanded}{tail}")
                }
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn lowercase_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        // keep acronyms and "I" as written
        Some(first) if chars.clone().next().is_some_and(char::is_lowercase) => {
            first.to_lowercase().chain(chars).collect()
        }
        _ => text.to_string(),
    }
}

/// Deterministic rewrite used when the model has nothing usable to offer.
pub fn local_rewrite(text: &str, mode: RewriteMode) -> String {
    let base = text.trim();
    match mode {
        RewriteMode::Standard => format!("In other words, {}", lowercase_first(base)),
        RewriteMode::Formal => {
            format!("From a professional standpoint, {}", lowercase_first(&expand_contractions(base)))
        }
        RewriteMode::Casual => {
            let relaxed = base.replace(". ", ", ");
            format!("Here's the gist: {} Pretty exciting, right?", lowercase_first(&relaxed))
        }
        RewriteMode::Creative => format!(
            "Imagine a vivid scene where {} The story bends possibility into something new.",
            lowercase_first(base)
        ),
        RewriteMode::Concise => {
            let first = sentences(base).first().copied().unwrap_or(base);
            let first = if count_words(first) > 25 { truncate_words(first, 25) } else { first };
            if first.eq_ignore_ascii_case(base) {
                format!("In short: {}", lowercase_first(base))
            } else {
                first.to_string()
            }
        }
    }
}

/// Strips echoed labels and wrapping quotes from a rewrite completion.
fn clean_rewrite(raw: &str) -> String {
    let mut text = raw.trim();
    for label in ["Rewritten text:", "Rewritten:", "Rewrite:"] {
        if let Some(head) = text.get(..label.len()) {
            if head.eq_ignore_ascii_case(label) {
                text = text[label.len()..].trim_start();
            }
        }
    }
    text.trim_matches(|c: char| matches!(c, '"' | '\u{201c}' | '\u{201d}'))
        .trim()
        .to_string()
}

pub fn choose_rewrite(original: &str, mode: RewriteMode, completion: &Completion) -> String {
    if completion.is_usable() {
        let candidate = clean_rewrite(&completion.text);
        if !candidate.is_empty() && !candidate.eq_ignore_ascii_case(original.trim()) {
            return candidate;
        }
    }
    local_rewrite(original, mode)
}

#[tracing::instrument(skip_all, fields(operation = "rewrite", request_id = %Uuid::new_v4()))]
pub async fn rewrite_text(
    State(state): State<AppState>,
    ValidatedJson(request): ValidatedJson<RewriteRequest>,
) -> Result<Json<ApiResponse<RewriteData>>, AppError> {
    let original_word_count = count_words(&request.text);
    tracing::info!(mode = ?request.mode, words = original_word_count, "Received rewrite request");

    let prompt = format!(
        "{}:\n\nOriginal text: \"{}\"\n\nRewritten text:",
        request.mode.instruction(),
        request.text.trim()
    );
    let params = GenerationParams::new((original_word_count * 2).clamp(64, 2048), 0.7);
    let completion = state
        .invoke(&state.budget(), OperationKind::Rewrite, ModelPayload::prompt(prompt, params))
        .await?
        .into_completion()?;

    let rewritten_text = choose_rewrite(&request.text, request.mode, &completion);
    let data = RewriteData {
        mode: request.mode,
        rewritten_word_count: count_words(&rewritten_text),
        rewritten_text,
        original_word_count,
        original_text: request.text,
    };
    respond("Text rewritten successfully", data)
}
