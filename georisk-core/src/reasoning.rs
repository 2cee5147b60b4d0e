//! Reasoning composer
//!
//! Renders a short explanation citing the signals (or provider) that most
//! influenced the outcome. Purely descriptive; nothing here feeds back into
//! scoring.

use crate::text::truncate_chars;
use crate::{RiskLevel, Signal, SignalKind};

/// Longest provider reasoning quoted verbatim
const MAX_PROVIDER_REASONING: usize = 300;

pub struct ReasoningComposer {
    /// Signals cited per explanation
    max_items: usize,
}

impl Default for ReasoningComposer {
    fn default() -> Self {
        Self { max_items: 3 }
    }
}

fn band(value: f64) -> &'static str {
    if value >= 0.66 {
        "high"
    } else if value >= 0.33 {
        "moderate"
    } else {
        "low"
    }
}

fn describe(signal: &Signal) -> String {
    let label = signal.label.as_deref();
    match signal.name {
        SignalKind::Category => format!(
            "category: {} ({:.2})",
            label.unwrap_or("unclassified"),
            signal.value
        ),
        SignalKind::Keyword => {
            let mut text = format!("keyword score {} ({:.2})", band(signal.value), signal.value);
            if !signal.evidence.is_empty() {
                let terms: Vec<&str> = signal.evidence.iter().take(3).map(String::as_str).collect();
                text.push_str(&format!(" [{}]", terms.join(", ")));
            }
            text
        }
        SignalKind::Geographic => format!("country: {}", label.unwrap_or("unspecified region")),
        SignalKind::Sentiment => format!("sentiment: {} ({:.2})", label.unwrap_or("neutral"), signal.value),
        SignalKind::Escalation => match label {
            Some(terms) if !signal.evidence.is_empty() => format!("escalation indicators: {}", terms),
            _ => "no escalation indicators".to_string(),
        },
    }
}

impl ReasoningComposer {
    pub fn new(max_items: usize) -> Self {
        Self { max_items: max_items.max(1) }
    }

    /// Cite the strongest contributors, most influential first
    fn top_signals<'a>(&self, signals: &'a [Signal], contributions: &[(SignalKind, f64)], limit: usize) -> Vec<&'a Signal> {
        let mut ranked: Vec<(&Signal, f64)> = signals
            .iter()
            .filter(|s| !s.is_degraded())
            .map(|s| {
                let weight = contributions
                    .iter()
                    .find(|(kind, _)| *kind == s.name)
                    .map(|(_, c)| *c)
                    .unwrap_or(0.0);
                (s, weight)
            })
            .collect();

        // Stable sort keeps fusion order among equal contributions
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.into_iter().take(limit).map(|(s, _)| s).collect()
    }

    fn degraded_note(signals: &[Signal]) -> Option<String> {
        let degraded: Vec<String> = signals
            .iter()
            .filter_map(|s| s.degraded.as_ref().map(|why| format!("{} ({})", s.name, why)))
            .collect();
        (!degraded.is_empty()).then(|| format!("degraded: {}", degraded.join(", ")))
    }

    /// Explanation for a locally fused result
    pub fn compose_local(&self, signals: &[Signal], contributions: &[(SignalKind, f64)]) -> String {
        let mut parts: Vec<String> = self
            .top_signals(signals, contributions, self.max_items)
            .into_iter()
            .map(describe)
            .collect();

        if parts.is_empty() {
            parts.push("no usable signals; neutral defaults applied".to_string());
        }
        if let Some(note) = Self::degraded_note(signals) {
            parts.push(note);
        }
        parts.join("; ")
    }

    /// Explanation for a provider verdict, with the local signals as context
    pub fn compose_remote(
        &self,
        provider: &str,
        level: RiskLevel,
        confidence: f64,
        provider_reasoning: Option<&str>,
        signals: &[Signal],
        contributions: &[(SignalKind, f64)],
    ) -> String {
        let lead = match provider_reasoning.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reasoning) => format!("{}: {}", provider, truncate_chars(reasoning, MAX_PROVIDER_REASONING)),
            None => format!("{} classified risk as {} ({:.2})", provider, level, confidence),
        };

        let local: Vec<String> = self
            .top_signals(signals, contributions, self.max_items.min(2))
            .into_iter()
            .map(describe)
            .collect();

        if local.is_empty() {
            lead
        } else {
            format!("{} | local signals: {}", lead, local.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(name: SignalKind, value: f64, label: &str) -> Signal {
        Signal {
            name,
            value,
            label: Some(label.to_string()),
            evidence: vec!["x".to_string()],
            degraded: None,
        }
    }

    #[test]
    fn test_local_cites_top_contributors_first() {
        let signals = vec![
            signal(SignalKind::Sentiment, 0.9, "strongly negative"),
            signal(SignalKind::Category, 0.82, "armed conflict"),
            signal(SignalKind::Geographic, 0.9, "high-risk region (ukraine)"),
        ];
        let contributions = vec![
            (SignalKind::Sentiment, 0.135),
            (SignalKind::Category, 0.287),
            (SignalKind::Geographic, 0.135),
        ];

        let text = ReasoningComposer::default().compose_local(&signals, &contributions);
        assert!(text.starts_with("category: armed conflict (0.82)"));
        assert!(text.contains("country: high-risk region (ukraine)"));
    }

    #[test]
    fn test_degraded_signals_are_reported() {
        let mut broken = signal(SignalKind::Sentiment, 0.5, "neutral");
        broken.degraded = Some("no text to analyze".to_string());
        let signals = vec![broken, signal(SignalKind::Keyword, 0.0, "low")];

        let text = ReasoningComposer::default().compose_local(&signals, &[(SignalKind::Keyword, 0.0)]);
        assert!(text.contains("degraded: sentiment (no text to analyze)"));
    }

    #[test]
    fn test_remote_quotes_provider() {
        let text = ReasoningComposer::default().compose_remote(
            "openai",
            RiskLevel::High,
            0.9,
            Some("Active hostilities near the capital"),
            &[],
            &[],
        );
        assert_eq!(text, "openai: Active hostilities near the capital");
    }

    #[test]
    fn test_remote_without_reasoning() {
        let text = ReasoningComposer::default().compose_remote("ollama", RiskLevel::Low, 0.4, None, &[], &[]);
        assert_eq!(text, "ollama classified risk as low (0.40)");
    }
}
