//! Geographic risk signal

use crate::{CountryRiskTable, SignalKind, NEUTRAL_SIGNAL};

use super::{ExtractionContext, ExtractorError, SignalExtractor, SignalReading};

pub struct GeographicExtractor {
    table: CountryRiskTable,
}

impl GeographicExtractor {
    pub fn new(table: CountryRiskTable) -> Self {
        Self { table }
    }
}

/// Describe a tier for reasoning text
pub fn tier_label(tier: f64) -> &'static str {
    if tier >= 0.7 {
        "high-risk region"
    } else if tier >= 0.4 {
        "elevated-risk region"
    } else {
        "low-risk region"
    }
}

impl SignalExtractor for GeographicExtractor {
    fn kind(&self) -> SignalKind {
        SignalKind::Geographic
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
        let Some(country) = ctx.country else {
            return Ok(SignalReading::new(NEUTRAL_SIGNAL).with_label("unspecified region"));
        };

        Ok(match self.table.lookup(country) {
            Some(found) => SignalReading::new(found.tier)
                .with_label(format!("{} ({})", tier_label(found.tier), found.name))
                .with_evidence(vec![found.name]),
            None => SignalReading::new(NEUTRAL_SIGNAL).with_label(format!("unknown region ({})", country)),
        })
    }
}
