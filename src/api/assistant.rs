// DOCUMENT QA: answers questions about an uploaded document
//
// The answer handed back is always grounded in the document. Model answers
// that share no content term with the document are extended with the most
// relevant document sentences; offline fallbacks are replaced by them.

use std::collections::HashSet;

use axum::{extract::State, response::Json};
use serde::Serialize;
use uuid::Uuid;

use super::envelope::{ensure_text, respond, ApiResponse, ResponseContract};
use super::extract::UploadForm;
use super::AppState;
use crate::errors::AppError;
use crate::models::{ChatMessage, Completion, GenerationParams, ModelPayload, OperationKind, OutputSource};
use crate::text::{content_terms, sentences};

const DOCUMENT_PROMPT_CHARS: usize = 3000;
const EXCERPT_SENTENCES: usize = 3;
const EXCERPT_MAX_CHARS: usize = 600;

#[derive(Debug, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub mime: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantAnswer {
    pub answer: String,
    pub file_info: FileInfo,
}

impl ResponseContract for AssistantAnswer {
    fn check(&self) -> Result<(), String> {
        ensure_text("answer", &self.answer)?;
        ensure_text("fileInfo.name", &self.file_info.name)
    }
}

fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Up to three document sentences with the highest term overlap with `question`,
/// in document order, capped near 600 characters.
pub fn relevant_excerpt(document: &str, question: &str) -> String {
    let question_terms: HashSet<String> = content_terms(question).into_iter().collect();
    let candidates = sentences(document);

    let mut ranked: Vec<(usize, usize)> = candidates
        .iter()
        .enumerate()
        .map(|(position, sentence)| {
            let overlap = content_terms(sentence)
                .into_iter()
                .collect::<HashSet<_>>()
                .intersection(&question_terms)
                .count();
            (position, overlap)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut chosen: Vec<usize> = if ranked.first().is_some_and(|(_, overlap)| *overlap > 0) {
        ranked
            .iter()
            .filter(|(_, overlap)| *overlap > 0)
            .take(EXCERPT_SENTENCES)
            .map(|(position, _)| *position)
            .collect()
    } else {
        (0..candidates.len().min(EXCERPT_SENTENCES)).collect()
    };
    chosen.sort_unstable();

    let mut excerpt = String::new();
    for position in chosen {
        let sentence = candidates[position];
        if !excerpt.is_empty() && excerpt.chars().count() + sentence.chars().count() + 1 > EXCERPT_MAX_CHARS {
            break;
        }
        if !excerpt.is_empty() {
            excerpt.push(' ');
        }
        excerpt.push_str(sentence);
    }

    if excerpt.chars().count() > EXCERPT_MAX_CHARS {
        excerpt = format!("{}...", char_prefix(&excerpt, EXCERPT_MAX_CHARS).trim_end());
    }
    if excerpt.is_empty() {
        excerpt = char_prefix(document.trim(), EXCERPT_MAX_CHARS).to_string();
    }
    excerpt
}

fn shares_content_term(answer: &str, document: &str) -> bool {
    let document_terms: HashSet<String> = content_terms(document).into_iter().collect();
    content_terms(answer).iter().any(|term| document_terms.contains(term))
}

/// Final answer text and whether it came from the model or the document itself.
pub fn grounded_answer(completion: &Completion, document: &str, question: &str) -> (String, OutputSource) {
    if completion.is_usable() {
        let answer = completion.text.trim();
        if shares_content_term(answer, document) {
            return (answer.to_string(), OutputSource::Model);
        }
        tracing::debug!("Model answer is not grounded in the document, appending excerpt");
        return (
            format!("{answer}\n\nFrom the document: {}", relevant_excerpt(document, question)),
            OutputSource::Model,
        );
    }
    (
        format!("Based on the uploaded document: {}", relevant_excerpt(document, question)),
        OutputSource::Fallback,
    )
}

fn assistant_prompt(document: &str, question: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(
            "You are a meticulous document analysis assistant. Answer only from the uploaded document. \
             If the answer is not in the document, say so explicitly. Quote the document when possible.",
        ),
        ChatMessage::user(format!(
            "Document excerpt:\n\"\"\"\n{}\n\"\"\"\n\nQuestion:\n{question}",
            char_prefix(document, DOCUMENT_PROMPT_CHARS)
        )),
    ]
}

#[tracing::instrument(skip_all, fields(operation = "document-qa", request_id = %Uuid::new_v4()))]
pub async fn respond_assistant(
    State(state): State<AppState>,
    mut form: UploadForm,
) -> Result<Json<ApiResponse<AssistantAnswer>>, AppError> {
    let question = form.require_field("user_input")?;
    let file = form.take_file()?;
    let document = file.document_text().await?;
    tracing::info!(
        file_name = %file.file_name,
        size = file.size(),
        question_length = question.len(),
        "Received document question"
    );

    let params = GenerationParams::new(600, 0.2).with_top_p(0.9);
    let completion = state
        .invoke(
            &state.budget(),
            OperationKind::DocumentQa,
            ModelPayload::chat(assistant_prompt(&document, &question), params),
        )
        .await?
        .into_completion()?;

    let (answer, source) = grounded_answer(&completion, &document, &question);
    tracing::info!(source = ?source, answer_length = answer.len(), "Document question answered");

    let data = AssistantAnswer {
        answer,
        file_info: FileInfo {
            size: file.size(),
            mime: file.mime().to_string(),
            name: file.file_name,
        },
    };
    respond("Response generated successfully", data)
}
