//! Escalation signal: share of the indicator vocabulary present in the text

use crate::text::count_term;
use crate::{EscalationVocabulary, SignalKind};

use super::{ExtractionContext, ExtractorError, SignalExtractor, SignalReading};

pub struct EscalationExtractor {
    vocabulary: EscalationVocabulary,
}

impl EscalationExtractor {
    pub fn new(vocabulary: EscalationVocabulary) -> Self {
        Self { vocabulary }
    }
}

impl SignalExtractor for EscalationExtractor {
    fn kind(&self) -> SignalKind {
        SignalKind::Escalation
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
        if self.vocabulary.is_empty() {
            return Err(ExtractorError::Internal("escalation vocabulary is empty".to_string()));
        }

        let present: Vec<String> = self
            .vocabulary
            .terms()
            .iter()
            .filter(|term| count_term(ctx.tokens, term) > 0)
            .cloned()
            .collect();

        let value = present.len() as f64 / self.vocabulary.len() as f64;
        let label = if present.is_empty() {
            "none".to_string()
        } else {
            present.join(", ")
        };

        Ok(SignalReading::new(value).with_label(label).with_evidence(present))
    }
}
