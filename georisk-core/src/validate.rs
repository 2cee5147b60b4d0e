//! Result validation and schema normalization
//!
//! Provider JSON comes in many shapes: `level` or `risk_level` or `riskLevel`,
//! English or localized values, numbers as fractions, percentages or strings.
//! [`validate_verdict`] maps all of them onto one shape, and
//! [`normalize_result`] enforces the canonical invariants on any `RiskResult`.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{RiskLevel, RiskResult, FALLBACK_PROVIDER};

/// Multiplier applied to confidence when the level word is not recognized
pub const UNRECOGNIZED_LEVEL_PENALTY: f64 = 0.5;

/// Confidence assumed when a provider reports only a score
pub const DEFAULT_PROVIDER_CONFIDENCE: f64 = 0.7;

/// Fractions up to this value are overshoot and clamp to 1, not percentages
const FRACTION_OVERSHOOT: f64 = 1.5;

/// A score below this contradicts "high", one at or above the high cutoff contradicts "low"
const CONTRADICTION_LOW: f64 = 0.4;
const CONTRADICTION_HIGH: f64 = 0.7;

/// Longest reasoning text kept from a provider
const MAX_REASONING_CHARS: usize = 600;

const LEVEL_KEYS: &[&str] = &[
    "level", "risklevel", "nivel", "nivelriesgo", "nivelderiesgo", "severitylevel",
    "classification", "riskcategory",
];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "confidencescore", "confianza", "certainty", "probability"];
const SCORE_KEYS: &[&str] = &["score", "riskscore", "severity", "severityscore", "puntuacion", "puntaje"];
const REASONING_KEYS: &[&str] = &[
    "reasoning", "explanation", "justification", "rationale", "reason", "razonamiento", "explicacion",
];
const NESTED_KEYS: &[&str] = &["analysis", "result", "risk_assessment", "assessment", "data"];

/// Why a provider object was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response is not a JSON object")]
    NotAnObject,

    #[error("no risk level field")]
    MissingLevel,

    #[error("no numeric confidence or severity field")]
    MissingNumeric,
}

/// A provider verdict mapped onto the canonical shape
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedVerdict {
    pub level: RiskLevel,
    pub score: f64,
    pub confidence: f64,
    pub reasoning: Option<String>,
    /// False when the level fell back to `low` because its value was not understood
    pub level_recognized: bool,
}

fn canonical_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            other => other,
        })
        .collect()
}

fn field<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    // Preference follows the key list, not the object's own order
    keys.iter().find_map(|wanted| {
        object
            .iter()
            .find(|(key, value)| canonical_key(key) == *wanted && !value.is_null())
            .map(|(_, value)| value)
    })
}

/// Read a number given as a fraction, a percentage, or a numeric string
pub fn parse_unit_number(value: &Value) -> Option<f64> {
    let (raw, percent) = match value {
        Value::Number(n) => (n.as_f64()?, false),
        Value::String(s) => {
            let trimmed = s.trim();
            match trimmed.strip_suffix('%') {
                Some(number) => (number.trim().parse::<f64>().ok()?, true),
                None => (trimmed.parse::<f64>().ok()?, false),
            }
        }
        _ => return None,
    };

    if !raw.is_finite() {
        return None;
    }

    let scaled = if percent || (raw > FRACTION_OVERSHOOT && raw <= 100.0) { raw / 100.0 } else { raw };
    Some(scaled.clamp(0.0, 1.0))
}

/// True when a score sits a full band away from the reported level
fn contradicts(level: RiskLevel, score: f64) -> bool {
    match level {
        RiskLevel::High => score < CONTRADICTION_LOW,
        RiskLevel::Low => score >= CONTRADICTION_HIGH,
        RiskLevel::Medium => false,
    }
}

fn level_from(value: &Value) -> Option<RiskLevel> {
    match value {
        Value::String(s) => RiskLevel::parse_label(s),
        _ => None,
    }
}

/// The object holding the verdict: the top level, or a well-known wrapper
fn verdict_object(object: &Map<String, Value>) -> &Map<String, Value> {
    if field(object, LEVEL_KEYS).is_some() {
        return object;
    }
    NESTED_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_object))
        .filter(|inner| field(inner, LEVEL_KEYS).is_some())
        .unwrap_or(object)
}

/// Validate a provider object against the canonical verdict shape
pub fn validate_verdict(value: &Value) -> Result<ValidatedVerdict, ValidationError> {
    let object = value.as_object().ok_or(ValidationError::NotAnObject)?;
    validate_object(object)
}

/// Validate an already extracted JSON object
pub fn validate_object(object: &Map<String, Value>) -> Result<ValidatedVerdict, ValidationError> {
    let object = verdict_object(object);

    let level_value = field(object, LEVEL_KEYS).ok_or(ValidationError::MissingLevel)?;
    let confidence = field(object, CONFIDENCE_KEYS).and_then(parse_unit_number);
    let score = field(object, SCORE_KEYS).and_then(parse_unit_number);

    if confidence.is_none() && score.is_none() {
        return Err(ValidationError::MissingNumeric);
    }

    let parsed_level = level_from(level_value);
    let level_recognized = parsed_level.is_some();
    let level = parsed_level.unwrap_or(RiskLevel::Low);

    let mut confidence = confidence.unwrap_or(DEFAULT_PROVIDER_CONFIDENCE);
    if !level_recognized {
        confidence *= UNRECOGNIZED_LEVEL_PENALTY;
    }

    let reasoning = field(object, REASONING_KEYS)
        .and_then(Value::as_str)
        .map(|s| crate::text::truncate_chars(s.trim(), MAX_REASONING_CHARS).to_string())
        .filter(|s| !s.is_empty());

    // A recognized level outranks a number on some other scale
    let score = score
        .filter(|score| !(level_recognized && contradicts(level, *score)))
        .unwrap_or_else(|| level.anchor_score());

    Ok(ValidatedVerdict {
        level,
        score,
        confidence: confidence.clamp(0.0, 1.0),
        reasoning,
        level_recognized,
    })
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Enforce canonical invariants on a result from any path
pub fn normalize_result(mut result: RiskResult) -> RiskResult {
    result.score = unit(result.score);
    result.confidence = unit(result.confidence);
    for value in result.signals.values_mut() {
        *value = if value.is_finite() { value.clamp(0.0, 1.0) } else { crate::NEUTRAL_SIGNAL };
    }

    if result.provider_used.trim().is_empty() {
        result.provider_used = FALLBACK_PROVIDER.to_string();
        result.ai_powered = false;
    }
    if result.reasoning.trim().is_empty() {
        result.reasoning = format!("classified as {} risk", result.level);
    }
    result
}
