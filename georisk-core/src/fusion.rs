//! Risk fusion engine
//!
//! `score = clip(Σ weight_i · signal_i, 0, 1)`, summed in `SignalKind::ALL`
//! order, then thresholded into a level. Identical signals and configuration
//! always produce bit-identical output.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::{RiskLevel, SignalKind, NEUTRAL_SIGNAL};

/// Tolerance on the weight sum
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Fusion configuration errors
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Weight for {signal} must be a finite non-negative number, got {value}")]
    InvalidWeight { signal: SignalKind, value: f64 },

    #[error("Fusion weights must sum to 1.0, got {0}")]
    WeightSum(f64),

    #[error("Thresholds must satisfy 0 < medium ({medium}) < high ({high}) <= 1")]
    Thresholds { high: f64, medium: f64 },
}

/// Per-signal fusion weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionWeights {
    pub sentiment: f64,
    pub category: f64,
    pub keyword: f64,
    pub geographic: f64,
    pub escalation: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            sentiment: 0.15,
            category: 0.35,
            keyword: 0.25,
            geographic: 0.15,
            escalation: 0.10,
        }
    }
}

impl FusionWeights {
    pub fn weight(&self, kind: SignalKind) -> f64 {
        match kind {
            SignalKind::Sentiment => self.sentiment,
            SignalKind::Category => self.category,
            SignalKind::Keyword => self.keyword,
            SignalKind::Geographic => self.geographic,
            SignalKind::Escalation => self.escalation,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in SignalKind::ALL {
            let value = self.weight(kind);
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { signal: kind, value });
            }
        }

        let sum: f64 = SignalKind::ALL.iter().map(|k| self.weight(*k)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum(sum));
        }
        Ok(())
    }
}

/// Level cutoffs: `score >= high` ⇒ high, `score >= medium` ⇒ medium
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub high: f64,
    pub medium: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { high: 0.7, medium: 0.4 }
    }
}

impl Thresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = self.medium > 0.0 && self.high > self.medium && self.high <= 1.0;
        if !ordered || !self.high.is_finite() || !self.medium.is_finite() {
            return Err(ConfigError::Thresholds { high: self.high, medium: self.medium });
        }
        Ok(())
    }

    pub fn classify(&self, score: f64) -> RiskLevel {
        if score >= self.high {
            RiskLevel::High
        } else if score >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Weights and thresholds together
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub weights: FusionWeights,
    pub thresholds: Thresholds,
}

impl FusionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()
    }
}

/// Output of fusion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusedScore {
    pub score: f64,
    pub level: RiskLevel,
}

/// Combines named signals into a score and level
#[derive(Debug, Clone)]
pub struct RiskFusionEngine {
    config: FusionConfig,
}

impl RiskFusionEngine {
    pub fn new(config: FusionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Signal value used by fusion; missing or non-finite values are neutral
    fn value_of(signals: &BTreeMap<String, f64>, kind: SignalKind) -> f64 {
        signals
            .get(kind.as_str())
            .copied()
            .filter(|v| v.is_finite())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(NEUTRAL_SIGNAL)
    }

    /// Weighted contribution of each signal, in fusion order
    pub fn contributions(&self, signals: &BTreeMap<String, f64>) -> Vec<(SignalKind, f64)> {
        SignalKind::ALL
            .iter()
            .map(|kind| (*kind, self.config.weights.weight(*kind) * Self::value_of(signals, *kind)))
            .collect()
    }

    pub fn fuse(&self, signals: &BTreeMap<String, f64>) -> FusedScore {
        let raw: f64 = self.contributions(signals).iter().fold(0.0, |acc, (_, c)| acc + c);
        let score = raw.clamp(0.0, 1.0);

        FusedScore {
            score,
            level: self.config.thresholds.classify(score),
        }
    }
}
