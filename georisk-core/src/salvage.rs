//! Salvage parsing of provider responses
//!
//! Providers are asked for JSON only, but often wrap it in prose or markdown
//! fences. The salvage parser tries, in order: the whole response, fenced code
//! blocks, then every brace-balanced `{...}` span from left to right, and
//! returns the first one that parses as a JSON object.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use thiserror::Error;

/// Upper bound on `{` positions tried
const MAX_CANDIDATES: usize = 64;

static FENCE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)```").unwrap()
});

/// Why no object could be recovered
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SalvageError {
    #[error("empty response")]
    Empty,

    #[error("no JSON object found in response")]
    NoObject,

    #[error("found {candidates} JSON-like spans but none parsed as an object")]
    Unparseable { candidates: usize },
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// End index (inclusive) of the balanced object starting at `start`
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Recover the first JSON object embedded in `text`
pub fn salvage_json(text: &str) -> Result<Map<String, Value>, SalvageError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SalvageError::Empty);
    }

    if let Some(object) = parse_object(trimmed) {
        return Ok(object);
    }

    for captures in FENCE_REGEX.captures_iter(trimmed) {
        if let Some(object) = captures.get(1).and_then(|body| parse_object(body.as_str())) {
            return Ok(object);
        }
    }

    let mut candidates = 0;
    for (start, _) in trimmed.match_indices('{').take(MAX_CANDIDATES) {
        let Some(end) = balanced_end(trimmed, start) else {
            continue;
        };
        candidates += 1;
        if let Some(object) = parse_object(&trimmed[start..=end]) {
            return Ok(object);
        }
    }

    if candidates == 0 {
        Err(SalvageError::NoObject)
    } else {
        Err(SalvageError::Unparseable { candidates })
    }
}
