//! Sentence segmentation: raw page text → ordered sentences.
//!
//! This is a punctuation heuristic, not a linguistic boundary detector. It
//! knows nothing about abbreviations or locale, so "Dr. Smith" becomes two
//! sentences. That is acceptable for the downstream consumers, which only
//! need roughly sentence-sized units.
//!
//! A sentence ends after a run of `.`, `?` or `!` that is followed by a space
//! or the end of the text. Runs such as `?!` or `...` stay attached to the
//! sentence they close, and tokens like `3.14` are not split.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse every run of whitespace (line breaks included) into one space and trim.
pub fn normalise_whitespace(text: &str) -> String {
    RE_WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '?' | '!')
}

/// Split `text` into sentences.
///
/// Joining the result with single spaces reproduces
/// [`normalise_whitespace`]`(text)` exactly. Empty or whitespace-only input
/// yields an empty vector.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalised = normalise_whitespace(text);
    if normalised.is_empty() {
        return Vec::new();
    }

    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = normalised.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !is_terminal(c) {
            continue;
        }
        // Swallow the rest of the punctuation run.
        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if !is_terminal(next) {
                break;
            }
            end = j + next.len_utf8();
            chars.next();
        }
        match chars.peek() {
            Some(&(_, ' ')) => {
                sentences.push(normalised[start..end].to_string());
                chars.next();
                start = end + 1;
            }
            None => {
                sentences.push(normalised[start..end].to_string());
                start = end;
            }
            _ => {}
        }
    }

    if start < normalised.len() {
        sentences.push(normalised[start..].to_string());
    }
    sentences
}
