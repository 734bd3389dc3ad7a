//! Transcript clean-up
//!
//! Recognizers often drop apostrophes and sentence casing. These rules restore
//! the common cases before the text reaches the language model.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Missing-apostrophe corrections, applied in order
const CORRECTIONS: &[(&str, &str)] = &[
    ("i'm", "I'm"),
    ("im ", "I'm "),
    ("dont", "don't"),
    ("cant", "can't"),
    ("wont", "won't"),
    ("ive", "I've"),
    ("id ", "I'd "),
    ("ill ", "I'll "),
    ("youre", "you're"),
    ("theyre", "they're"),
    ("isnt", "isn't"),
    ("didnt", "didn't"),
    ("thats", "that's"),
    ("whats", "what's"),
    ("lets", "let's"),
    ("its ", "it's "),
    ("wasnt", "wasn't"),
    ("wouldnt", "wouldn't"),
    ("couldnt", "couldn't"),
    ("shouldnt", "shouldn't"),
    ("weve", "we've"),
    ("theyve", "they've"),
    ("youve", "you've"),
    ("havent", "haven't"),
];

static CORRECTION_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    CORRECTIONS
        .iter()
        .map(|(wrong, right)| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(wrong));
            (Regex::new(&pattern).expect("valid regex"), *right)
        })
        .collect()
});

static SENTENCE_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[.!?]\s+)([a-z])").expect("valid regex"));

static MISSING_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.!?,;:])([a-zA-Z])").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Fix contractions, sentence casing and spacing in a raw transcript
#[must_use]
pub fn normalize_transcript(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut text = text.to_string();
    for (rule, replacement) in CORRECTION_RULES.iter() {
        text = rule
            .replace_all(&text, regex::NoExpand(*replacement))
            .into_owned();
    }

    let text = SENTENCE_START.replace_all(&text, |caps: &Captures<'_>| {
        format!("{}{}", &caps[1], caps[2].to_uppercase())
    });
    let text = MISSING_SPACE.replace_all(&text, "$1 $2");

    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contractions() {
        assert_eq!(normalize_transcript("i dont know"), "I don't know");
        assert_eq!(normalize_transcript("Whats up"), "What's up");
        assert_eq!(normalize_transcript("im here"), "I'm here");
    }

    #[test]
    fn test_word_boundaries_respected() {
        assert_eq!(normalize_transcript("the dontology"), "The dontology");
    }

    #[test]
    fn test_sentence_capitalisation_and_spacing() {
        assert_eq!(
            normalize_transcript("hello there.how are you?   fine"),
            "Hello there. how are you? Fine"
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_transcript(""), "");
        assert_eq!(normalize_transcript("   "), "");
    }
}
