//! Canonical risk result schema
//!
//! Every analysis, local or remote, ends as a fully populated `RiskResult`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Categorical risk bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unrecognized risk level: {0}")]
pub struct UnknownLevel(pub String);

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    /// Representative score for a level when a provider omits the number
    pub fn anchor_score(&self) -> f64 {
        match self {
            RiskLevel::Low => 0.2,
            RiskLevel::Medium => 0.55,
            RiskLevel::High => 0.85,
        }
    }

    /// Parse a level word, accepting synonyms and localized forms
    pub fn parse_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphabetic() || c.is_whitespace())
            .collect();

        let level = match normalized.trim() {
            "low" | "minimal" | "minor" | "bajo" | "baja" | "faible" | "basso" | "bassa"
            | "baixo" | "baixa" | "niedrig" => RiskLevel::Low,
            "medium" | "moderate" | "mid" | "medio" | "media" | "moderado" | "moderada"
            | "moyen" | "moyenne" | "médio" | "mittel" => RiskLevel::Medium,
            "high" | "critical" | "severe" | "elevated" | "extreme" | "alto" | "alta"
            | "crítico" | "critico" | "grave" | "élevé" | "eleve" | "hoch" => RiskLevel::High,
            _ => return None,
        };
        Some(level)
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RiskLevel::parse_label(s).ok_or_else(|| UnknownLevel(s.to_string()))
    }
}

/// The five analytical techniques fused into a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Sentiment,
    Category,
    Keyword,
    Geographic,
    Escalation,
}

impl SignalKind {
    /// Fixed evaluation order; fusion sums in this order
    pub const ALL: [SignalKind; 5] = [
        SignalKind::Sentiment,
        SignalKind::Category,
        SignalKind::Keyword,
        SignalKind::Geographic,
        SignalKind::Escalation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Sentiment => "sentiment",
            SignalKind::Category => "category",
            SignalKind::Keyword => "keyword",
            SignalKind::Geographic => "geographic",
            SignalKind::Escalation => "escalation",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded indicator produced by one extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub name: SignalKind,
    /// Value in [0, 1]
    pub value: f64,
    /// Human-readable qualifier (top category, country tier, ...)
    pub label: Option<String>,
    /// Terms that drove the value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
    /// Why the extractor fell back to neutral, if it did
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

impl Signal {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Audit trail attached to every result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDetail {
    /// Top topic category of the local classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Country tier label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Risk keywords matched in the text
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_keywords: Vec<String>,
    /// Signals that degraded to neutral, with the reason
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded: Vec<String>,
}

/// Canonical output of an analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    pub level: RiskLevel,
    /// Fused (or provider-reported) risk score in [0, 1]
    pub score: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub reasoning: String,
    /// Local signal values keyed by signal name
    pub signals: BTreeMap<String, f64>,
    pub provider_used: String,
    pub ai_powered: bool,
    /// Backend model name when a remote provider produced the verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub analyzed_at: DateTime<Utc>,
    #[serde(default)]
    pub detail: AnalysisDetail,
}

impl RiskResult {
    /// Signal value by kind
    pub fn signal(&self, kind: SignalKind) -> Option<f64> {
        self.signals.get(kind.as_str()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_localized_levels() {
        assert_eq!(RiskLevel::parse_label("ALTO"), Some(RiskLevel::High));
        assert_eq!(RiskLevel::parse_label("medio"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse_label(" Bajo. "), Some(RiskLevel::Low));
        assert_eq!(RiskLevel::parse_label("Moderate"), Some(RiskLevel::Medium));
        assert_eq!(RiskLevel::parse_label("purple"), None);
    }

    #[test]
    fn test_level_from_str_and_display() {
        let level: RiskLevel = "Critical".parse().unwrap();
        assert_eq!(level, RiskLevel::High);
        assert_eq!(level.to_string(), "high");
        assert!("unknown".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_level_serializes_lowercase() {
        let json = serde_json::to_string(&RiskLevel::Medium).unwrap();
        assert_eq!(json, "\"medium\"");
    }
}
