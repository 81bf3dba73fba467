//! Plain-text helpers shared by the model backends and the response shapers.

use std::collections::{HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    "about", "after", "also", "and", "been", "being", "but", "can", "could", "does", "for",
    "from", "have", "into", "its", "just", "more", "most", "much", "over", "role", "skill",
    "skills", "some", "such", "team", "than", "that", "the", "their", "them", "then", "there",
    "these", "they", "this", "under", "used", "very", "was", "were", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "work", "would", "your",
];

pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Prefix of `text` holding at most `max_words` words, original spacing preserved.
pub fn truncate_words(text: &str, max_words: usize) -> &str {
    if max_words == 0 {
        return "";
    }
    let mut seen = 0;
    let mut in_word = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if in_word {
                seen += 1;
                in_word = false;
                if seen == max_words {
                    return &text[..idx];
                }
            }
        } else {
            in_word = true;
        }
    }
    text.trim_end()
}

/// Sentences split on terminal punctuation, trimmed, empties dropped.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '!' | '?' | '\n') {
            let end = idx + ch.len_utf8();
            let piece = text[start..end].trim();
            if piece.chars().any(char::is_alphanumeric) {
                out.push(piece);
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if tail.chars().any(char::is_alphanumeric) {
        out.push(tail);
    }
    out
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strips list markers ("1.", "2)", "-", "*", "•") and wrapping quotes from a model output line.
pub fn clean_list_line(line: &str) -> String {
    let mut rest = line.trim();
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let after = &rest[digits..];
        if let Some(stripped) = after.strip_prefix(|c: char| matches!(c, '.' | ')' | ':' | '-')) {
            rest = stripped;
        }
    }
    rest = rest.trim_start_matches(|c: char| matches!(c, '-' | '*' | '•' | ' '));
    rest = rest.trim();
    rest = rest.trim_matches(|c: char| matches!(c, '"' | '\u{201c}' | '\u{201d}' | '*'));
    rest.trim().to_string()
}

/// Non-empty cleaned lines, de-duplicated case-insensitively, in order.
pub fn list_items(raw: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.lines()
        .map(clean_list_line)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.ends_with(':'))
        .filter(|line| seen.insert(line.to_lowercase()))
        .collect()
}

/// Outermost `{...}` block of a model response, if any.
pub fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Lowercase alphanumeric tokens of at least four characters that are not stop words.
pub fn content_terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= 4)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

/// The `limit` most frequent content terms, ties broken by first appearance.
pub fn top_terms(text: &str, limit: usize) -> Vec<String> {
    let terms = content_terms(text);
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, term) in terms.iter().enumerate() {
        counts.entry(term.as_str()).or_insert((0, position)).0 += 1;
    }
    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(term, _)| term.to_string())
        .collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
