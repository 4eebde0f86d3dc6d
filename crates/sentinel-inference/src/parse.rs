//! Parsing of free-text model output.
//!
//! Models are asked for `|score|reason|`. They do not always comply, so the
//! parser falls back to the first integer in the text, and finally to no
//! result at all. Nothing here panics or errors on odd output.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::error::{InferenceError, InferenceResult};
use crate::prompt::TRANSLATION_SEPARATOR;

static DELIMITED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|(\d+)\|([^|]+)\|").expect("valid delimited regex"));

static FIRST_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("valid integer regex"));

/// Extract `(score, reason)` from model output.
///
/// Scores above 100 are clamped. Returns `None` when the text holds no
/// number at all.
pub fn parse_score_and_reason(text: &str) -> Option<(u8, String)> {
    if let Some(captures) = DELIMITED.captures(text) {
        let score = clamp_score(&captures[1]);
        let reason = captures[2].trim().to_string();
        return Some((score, reason));
    }

    match FIRST_INTEGER.find(text) {
        Some(found) => {
            warn!(response = %text, "Model output missing delimiters, using first number");
            Some((clamp_score(found.as_str()), String::new()))
        }
        None => {
            warn!(response = %text, "Model output has no score");
            None
        }
    }
}

fn clamp_score(digits: &str) -> u8 {
    // Only overflow can fail here: the regex guarantees ASCII digits.
    digits
        .parse::<u64>()
        .map(|value| value.min(100) as u8)
        .unwrap_or(100)
}

/// Split a translation response back into `expected` texts.
pub fn split_translations(text: &str, expected: usize) -> InferenceResult<Vec<String>> {
    let trimmed = text
        .trim()
        .trim_matches(TRANSLATION_SEPARATOR)
        .trim();
    let parts: Vec<String> = trimmed
        .split(TRANSLATION_SEPARATOR)
        .map(|part| part.trim().to_string())
        .collect();

    if parts.len() != expected {
        return Err(InferenceError::invalid_response(format!(
            "expected {} translated texts, got {}",
            expected,
            parts.len()
        )));
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimited_output() {
        assert_eq!(
            parse_score_and_reason("|85|A cat is visible on the sofa|"),
            Some((85, "A cat is visible on the sofa".to_string()))
        );
    }

    #[test]
    fn test_delimited_output_inside_chatter() {
        assert_eq!(
            parse_score_and_reason("Sure:\n|12|  empty room  |\n"),
            Some((12, "empty room".to_string()))
        );
        // A padded score breaks the delimited form, so the fallback applies.
        assert_eq!(
            parse_score_and_reason("| 7|nothing|"),
            Some((7, String::new()))
        );
    }

    #[test]
    fn test_fallback_to_first_integer() {
        assert_eq!(
            parse_score_and_reason("no delimiters here, score 42 maybe"),
            Some((42, String::new()))
        );
    }

    #[test]
    fn test_no_number_is_no_result() {
        assert_eq!(parse_score_and_reason("I cannot help with that."), None);
        assert_eq!(parse_score_and_reason(""), None);
    }

    #[test]
    fn test_scores_are_clamped() {
        assert_eq!(parse_score_and_reason("|250|very sure|").unwrap().0, 100);
        assert_eq!(
            parse_score_and_reason("99999999999999999999999 percent").unwrap().0,
            100
        );
    }

    #[test]
    fn test_split_translations() {
        assert_eq!(
            split_translations("|Hola | Adiós 👋|", 2).unwrap(),
            vec!["Hola".to_string(), "Adiós 👋".to_string()]
        );
        assert!(split_translations("Hola", 2).is_err());
    }
}
