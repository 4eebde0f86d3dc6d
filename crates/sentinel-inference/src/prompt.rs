//! Prompt templates shared by every provider.

use sentinel_models::DEFAULT_LANGUAGE;

/// Separator used when batching texts for translation.
pub const TRANSLATION_SEPARATOR: char = '|';

/// Instructions wrapping a user's watch prompt.
///
/// The model must answer in the `|score|reason|` format understood by
/// [`crate::parse::parse_score_and_reason`].
pub fn analysis_prompt(watch_for: &str, language: &str) -> String {
    let mut prompt = format!(
        "You are a sentinel watching for: {}.\n\
         Rate how well the video frames match what you are watching for.\n\
         \n\
         Respond ONLY in this format: |score|reason|\n\
         - score: 0-100 (0=no match, 100=perfect match)\n\
         - reason: one concise sentence explaining the score\n\
         \n\
         Example: |50|Not sure if there is a cat|",
        watch_for.trim()
    );

    if !is_default_language(language) {
        prompt.push_str(&format!(
            "\nWrite the reason in the language with ISO code \"{}\".",
            language.trim()
        ));
    }

    prompt
}

/// Instructions for translating UI strings.
pub fn translation_prompt(texts: &[String], language: &str) -> String {
    let joined = texts.join(&TRANSLATION_SEPARATOR.to_string());
    format!(
        "You are a professional translator. Translate the following texts to the language with ISO code \"{}\".\n\
         \n\
         RULES:\n\
         1. Preserve all emojis exactly as they are\n\
         2. Keep the tone and style of the original\n\
         3. Return ONLY the translated texts separated by {}\n\
         4. Keep the same order as the input\n\
         5. Do not add explanations or any other text\n\
         \n\
         Input texts:\n\
         {}\n\
         \n\
         Return the translated texts separated by {}:",
        language.trim(),
        TRANSLATION_SEPARATOR,
        joined,
        TRANSLATION_SEPARATOR
    )
}

/// Instructions for condensing watch log events into one sentence.
pub fn summary_prompt(events: &[String]) -> String {
    let listed = events
        .iter()
        .map(|event| format!("- {}", event.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Summarize the following observations from a video watch log into a single detailed sentence.\n\
         Mention what was seen and how it changed over time. Return only the sentence.\n\
         \n\
         Observations:\n\
         {}",
        listed
    )
}

fn is_default_language(language: &str) -> bool {
    let language = language.trim();
    language.is_empty() || language.to_lowercase().starts_with(DEFAULT_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_embeds_target_and_format() {
        let prompt = analysis_prompt("  a cat on the sofa ", "en");
        assert!(prompt.contains("watching for: a cat on the sofa."));
        assert!(prompt.contains("|score|reason|"));
        assert!(!prompt.contains("ISO code"));
    }

    #[test]
    fn test_analysis_prompt_requests_reason_language() {
        let prompt = analysis_prompt("dog", "fr");
        assert!(prompt.ends_with("Write the reason in the language with ISO code \"fr\"."));
        assert!(!analysis_prompt("dog", "en-US").contains("ISO code"));
    }

    #[test]
    fn test_translation_prompt_joins_texts() {
        let prompt = translation_prompt(&["Start".to_string(), "Stop 🛑".to_string()], "es");
        assert!(prompt.contains("Start|Stop 🛑"));
        assert!(prompt.contains("\"es\""));
    }

    #[test]
    fn test_summary_prompt_lists_events() {
        let prompt = summary_prompt(&["cat enters".to_string(), "cat sleeps".to_string()]);
        assert!(prompt.contains("- cat enters\n- cat sleeps"));
    }
}
