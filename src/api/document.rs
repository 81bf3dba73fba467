// DOCUMENT TEXT: plain text, PDF and Word uploads
//
// Supported uploads: TXT-like text, PDF, DOCX and legacy DOC. Parsing runs on
// the blocking pool; a parser panic on a malformed file becomes a 400 for that
// upload. Files that parse but carry no text are rejected the same way.

use std::io::{Cursor, Read};
use std::path::Path;

use axum::body::Bytes;
use quick_xml::{events::Event, Reader};

use crate::errors::AppError;

const TEXT_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "csv", "json", "log"];
const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
const DOCX_BODY: &str = "word/document.xml";
/// Shortest printable run kept when scanning a legacy Word file.
const MIN_RUN_CHARS: usize = 20;

const NO_TEXT_MESSAGE: &str = "No extractable text found. The file might be empty, corrupted, or \
                               image-based. Please upload a text-based PDF/DOC/DOCX/TXT.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PlainText,
    Pdf,
    Docx,
    LegacyWord,
}

impl DocumentKind {
    /// Kind from the declared content type, falling back to the file
    /// extension for generic binary uploads.
    pub fn detect(mime: &str, file_name: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/msword" => Some(Self::LegacyWord),
            DOCX_MIME => Some(Self::Docx),
            "application/json" => Some(Self::PlainText),
            text if text.starts_with("text/") => Some(Self::PlainText),
            "" | "application/octet-stream" => Self::from_extension(file_name),
            _ => None,
        }
    }

    fn from_extension(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "doc" => Some(Self::LegacyWord),
            other if TEXT_EXTENSIONS.contains(&other) => Some(Self::PlainText),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Pdf => "PDF",
            Self::Docx => "DOCX",
            Self::LegacyWord => "DOC",
        }
    }
}

/// Extracted, trimmed text of an uploaded document.
pub async fn extract_text(kind: DocumentKind, bytes: Bytes) -> Result<String, AppError> {
    let extracted = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::PlainText => plain_text(&bytes),
        DocumentKind::Pdf => pdf_text(&bytes),
        DocumentKind::Docx => docx_text(&bytes),
        DocumentKind::LegacyWord => legacy_word_text(&bytes),
    })
    .await
    .map_err(|err| {
        tracing::error!(kind = kind.label(), error = %err, "Document parser aborted");
        AppError::Validation(format!(
            "Failed to extract text: the {} file appears to be corrupted",
            kind.label()
        ))
    })??;

    let text = collapse_blank_lines(extracted.trim_start_matches('\u{feff}'));
    if text.is_empty() {
        return Err(AppError::Validation(NO_TEXT_MESSAGE.to_string()));
    }
    Ok(text)
}

fn plain_text(bytes: &[u8]) -> Result<String, AppError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| AppError::Validation("Failed to extract text: file is not valid UTF-8".to_string()))
}

fn pdf_text(bytes: &[u8]) -> Result<String, AppError> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|err| {
        tracing::warn!(error = %err, "PDF extraction failed");
        AppError::Validation(format!("Failed to extract text from PDF: {err}"))
    })
}

fn docx_text(bytes: &[u8]) -> Result<String, AppError> {
    let invalid = |detail: String| AppError::Validation(format!("Failed to extract text from DOCX: {detail}"));

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| invalid(e.to_string()))?;
    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY)
        .map_err(|_| invalid(format!("missing {DOCX_BODY}")))?
        .read_to_string(&mut xml)
        .map_err(|e| invalid(e.to_string()))?;

    word_xml_text(&xml).map_err(invalid)
}

/// Text runs of a WordprocessingML body, one line per paragraph.
fn word_xml_text(xml: &str) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(tag) if tag.local_name().as_ref() == b"t" => in_run_text = true,
            Event::End(tag) => match tag.local_name().as_ref() {
                b"t" => in_run_text = false,
                b"p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(tag) => match tag.local_name().as_ref() {
                b"tab" => text.push('\t'),
                b"br" | b"cr" => text.push('\n'),
                _ => {}
            },
            Event::Text(run) if in_run_text => {
                text.push_str(&run.unescape().map_err(|e| e.to_string())?);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(text)
}

/// Word 97-2003 binary files: best-effort scan for readable text runs.
///
/// DOCX payloads uploaded under the legacy type are parsed as DOCX.
fn legacy_word_text(bytes: &[u8]) -> Result<String, AppError> {
    if bytes.starts_with(b"PK\x03\x04") {
        return docx_text(bytes);
    }

    let mut runs: Vec<String> = Vec::new();
    // UTF-16LE body text
    collect_runs(
        bytes.chunks_exact(2).map(|pair| (pair[1] == 0).then_some(pair[0])),
        &mut runs,
    );
    // 8-bit body text
    collect_runs(bytes.iter().copied().map(Some), &mut runs);

    let mut seen = std::collections::HashSet::new();
    runs.retain(|run| seen.insert(run.clone()));
    Ok(runs.join("\n"))
}

fn collect_runs(units: impl Iterator<Item = Option<u8>>, runs: &mut Vec<String>) {
    let mut current = String::new();
    for unit in units {
        match unit {
            Some(byte) if byte == b'\t' || byte == b'\r' || byte == b'\n' || (0x20..0x7f).contains(&byte) => {
                current.push(byte as char);
            }
            _ => flush_run(&mut current, runs),
        }
    }
    flush_run(&mut current, runs);
}

fn flush_run(current: &mut String, runs: &mut Vec<String>) {
    let run = current.trim();
    if run.chars().count() >= MIN_RUN_CHARS && run.split_whitespace().count() >= 3 {
        runs.push(run.to_string());
    }
    current.clear();
}

/// Trims every line and keeps at most one blank line between paragraphs.
fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(line.trim_start());
        blank_run = 0;
    }
    out
}
