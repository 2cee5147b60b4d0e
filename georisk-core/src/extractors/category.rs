//! Topic category signal
//!
//! Each category votes with the number of distinct cue terms present. The top
//! category's confidence is its share of all votes damped by a saturating
//! curve over its own vote count; the signal is `base_weight · confidence`.

use crate::text::count_term;
use crate::{CategoryTaxonomy, SignalKind};

use super::{ExtractionContext, ExtractorError, SignalExtractor, SignalReading};

/// Cue-count scale of the confidence curve
const CUE_SATURATION: f64 = 2.0;

/// Confidence reported for the default category when nothing matches
const DEFAULT_CATEGORY_CONFIDENCE: f64 = 0.5;

/// Classification outcome for one text
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryVerdict {
    pub category: String,
    pub base_weight: f64,
    pub confidence: f64,
    pub cues: Vec<String>,
}

pub struct CategoryExtractor {
    taxonomy: CategoryTaxonomy,
}

impl CategoryExtractor {
    pub fn new(taxonomy: CategoryTaxonomy) -> Self {
        Self { taxonomy }
    }

    pub fn classify(&self, tokens: &[String]) -> CategoryVerdict {
        let votes: Vec<Vec<String>> = self
            .taxonomy
            .categories()
            .iter()
            .map(|category| {
                category
                    .cues
                    .iter()
                    .filter(|cue| count_term(tokens, cue) > 0)
                    .cloned()
                    .collect()
            })
            .collect();

        let total: usize = votes.iter().map(Vec::len).sum();
        if total == 0 {
            let default = self.taxonomy.default_category();
            return CategoryVerdict {
                category: default.name.clone(),
                base_weight: default.weight,
                confidence: DEFAULT_CATEGORY_CONFIDENCE,
                cues: Vec::new(),
            };
        }

        // Most cues wins; ties go to the riskier category, then table order
        let mut best = 0;
        for (idx, cues) in votes.iter().enumerate().skip(1) {
            let current = &self.taxonomy.categories()[idx];
            let leader = &self.taxonomy.categories()[best];
            if cues.len() > votes[best].len()
                || (cues.len() == votes[best].len() && current.weight > leader.weight)
            {
                best = idx;
            }
        }

        let winner = &self.taxonomy.categories()[best];
        let hits = votes[best].len() as f64;
        let share = hits / total as f64;
        let confidence = share * (1.0 - (-hits / CUE_SATURATION).exp());

        CategoryVerdict {
            category: winner.name.clone(),
            base_weight: winner.weight,
            confidence,
            cues: votes[best].clone(),
        }
    }
}

impl SignalExtractor for CategoryExtractor {
    fn kind(&self) -> SignalKind {
        SignalKind::Category
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
        if ctx.tokens.is_empty() {
            return Err(ExtractorError::EmptyInput);
        }

        let verdict = self.classify(ctx.tokens);
        Ok(SignalReading::new(verdict.base_weight * verdict.confidence)
            .with_label(verdict.category)
            .with_evidence(verdict.cues))
    }
}
