//! Text helpers shared by the extractors and prompt builders

use regex::Regex;
use std::sync::LazyLock;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{L}\p{N}]+(?:['’][\p{L}]+)*").unwrap()
});

/// Split text into lower-cased word tokens
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase().replace('’', "'"))
        .collect()
}

/// Count occurrences of a (possibly multi-word) term as consecutive tokens
pub fn count_term(tokens: &[String], term: &str) -> usize {
    let parts: Vec<&str> = term.split_whitespace().collect();
    if parts.is_empty() || parts.len() > tokens.len() {
        return 0;
    }

    tokens
        .windows(parts.len())
        .filter(|window| window.iter().zip(&parts).all(|(t, p)| t == p))
        .count()
}

/// Collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncate to at most `max_chars` characters, never splitting a char
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Truncate for log output, marking the cut
pub fn preview(text: &str, max_chars: usize) -> String {
    let cut = truncate_chars(text, max_chars);
    if cut.len() < text.len() {
        format!("{}...", cut)
    } else {
        cut.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_strips_punctuation() {
        let tokens = tokenize("Missile STRIKES, near the capital!");
        assert_eq!(tokens, vec!["missile", "strikes", "near", "the", "capital"]);
    }

    #[test]
    fn test_tokenize_keeps_contractions_and_accents() {
        let tokens = tokenize("They didn’t leave España");
        assert_eq!(tokens, vec!["they", "didn't", "leave", "españa"]);
    }

    #[test]
    fn test_count_multiword_term() {
        let tokens = tokenize("civil war fears as civil war spreads");
        assert_eq!(count_term(&tokens, "civil war"), 2);
        assert_eq!(count_term(&tokens, "war"), 2);
        assert_eq!(count_term(&tokens, "peace"), 0);
    }

    #[test]
    fn test_truncate_on_char_boundary() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
