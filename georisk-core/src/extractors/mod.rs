//! Signal extractors
//!
//! Each extractor is a pure function of the article text and metadata that
//! yields one normalized [0,1] signal. Failures come back as an
//! `ExtractorError`; [`extract_signal`] turns them into a neutral, degraded
//! signal so the remaining signals still reach fusion.

pub mod sentiment;
pub mod category;
pub mod keyword;
pub mod geographic;
pub mod escalation;

pub use sentiment::*;
pub use category::*;
pub use keyword::*;
pub use geographic::*;
pub use escalation::*;

use thiserror::Error;
use tracing::warn;

use crate::{Signal, SignalKind, NEUTRAL_SIGNAL};

/// Errors an extractor can report
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractorError {
    #[error("no text to analyze")]
    EmptyInput,

    #[error("non-finite signal value")]
    NonFinite,

    #[error("{0}")]
    Internal(String),
}

/// Everything an extractor may look at
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    /// Title and content joined
    pub text: &'a str,
    /// Lower-cased tokens of `text`
    pub tokens: &'a [String],
    pub country: Option<&'a str>,
    pub language: Option<&'a str>,
}

/// Raw extractor output before it becomes a `Signal`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignalReading {
    pub value: f64,
    pub label: Option<String>,
    pub evidence: Vec<String>,
}

impl SignalReading {
    pub fn new(value: f64) -> Self {
        Self { value, ..Default::default() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_evidence(mut self, evidence: Vec<String>) -> Self {
        self.evidence = evidence;
        self
    }
}

/// Common interface for signal extractors
pub trait SignalExtractor: Send + Sync {
    /// Which signal this extractor produces
    fn kind(&self) -> SignalKind;

    /// Compute the signal
    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError>;
}

/// Run one extractor, degrading any failure to a neutral signal
pub fn extract_signal(extractor: &dyn SignalExtractor, ctx: &ExtractionContext<'_>) -> Signal {
    let kind = extractor.kind();
    let outcome = extractor.extract(ctx).and_then(|reading| {
        if reading.value.is_finite() {
            Ok(reading)
        } else {
            Err(ExtractorError::NonFinite)
        }
    });

    match outcome {
        Ok(reading) => Signal {
            name: kind,
            value: reading.value.clamp(0.0, 1.0),
            label: reading.label,
            evidence: reading.evidence,
            degraded: None,
        },
        Err(e) => {
            warn!(signal = %kind, error = %e, "Extractor degraded to neutral");
            Signal {
                name: kind,
                value: NEUTRAL_SIGNAL,
                label: None,
                evidence: Vec::new(),
                degraded: Some(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl SignalExtractor for Broken {
        fn kind(&self) -> SignalKind {
            SignalKind::Sentiment
        }

        fn extract(&self, _ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
            Err(ExtractorError::Internal("model unavailable".to_string()))
        }
    }

    struct Overflowing;

    impl SignalExtractor for Overflowing {
        fn kind(&self) -> SignalKind {
            SignalKind::Keyword
        }

        fn extract(&self, _ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
            Ok(SignalReading::new(f64::NAN))
        }
    }

    fn ctx() -> ExtractionContext<'static> {
        ExtractionContext { text: "", tokens: &[], country: None, language: None }
    }

    #[test]
    fn test_failure_degrades_to_neutral() {
        let signal = extract_signal(&Broken, &ctx());
        assert_eq!(signal.value, NEUTRAL_SIGNAL);
        assert_eq!(signal.degraded.as_deref(), Some("model unavailable"));
    }

    #[test]
    fn test_non_finite_degrades_to_neutral() {
        let signal = extract_signal(&Overflowing, &ctx());
        assert_eq!(signal.value, NEUTRAL_SIGNAL);
        assert!(signal.is_degraded());
    }
}
