//! Keyword risk signal
//!
//! Each matched keyword contributes `weight · (1 + ln n)` for `n` occurrences.
//! The net contribution is mapped through `1 − e^(−net / K)`, so a handful of
//! strong matches saturates the same way on a headline as on a long article;
//! the score depends on what matched, not on how many other words surround it.
//! A net at or below zero (only risk-lowering terms) yields 0.

use crate::text::count_term;
use crate::{KeywordLexicon, SignalKind};

use super::{ExtractionContext, ExtractorError, SignalExtractor, SignalReading};

/// Net contribution at which the signal reaches 1 − 1/e
pub const KEYWORD_SATURATION: f64 = 1.5;

pub struct KeywordExtractor {
    lexicon: KeywordLexicon,
}

impl KeywordExtractor {
    pub fn new(lexicon: KeywordLexicon) -> Self {
        Self { lexicon }
    }

    /// Net weighted contribution and the matched terms, in lexicon order
    pub fn net_contribution(&self, tokens: &[String]) -> (f64, Vec<String>) {
        let mut net = 0.0;
        let mut matched = Vec::new();

        for (term, weight) in self.lexicon.iter() {
            let occurrences = count_term(tokens, term);
            if occurrences == 0 {
                continue;
            }
            net += weight * (1.0 + (occurrences as f64).ln());
            matched.push(term.to_string());
        }

        (net, matched)
    }
}

/// Map a net contribution onto [0, 1)
pub fn saturate(net: f64) -> f64 {
    if net <= 0.0 {
        0.0
    } else {
        1.0 - (-net / KEYWORD_SATURATION).exp()
    }
}

impl SignalExtractor for KeywordExtractor {
    fn kind(&self) -> SignalKind {
        SignalKind::Keyword
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
        let (net, matched) = self.net_contribution(ctx.tokens);
        let value = saturate(net);
        let band = if value >= 0.66 {
            "high"
        } else if value >= 0.33 {
            "moderate"
        } else {
            "low"
        };

        Ok(SignalReading::new(value).with_label(band).with_evidence(matched))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::tokenize;

    fn extractor() -> KeywordExtractor {
        KeywordExtractor::new(KeywordLexicon::embedded().unwrap())
    }

    fn value(text: &str) -> f64 {
        let tokens = tokenize(text);
        let ctx = ExtractionContext { text, tokens: &tokens, country: None, language: None };
        extractor().extract(&ctx).unwrap().value
    }

    #[test]
    fn test_strong_matches_saturate_high() {
        assert!(value("missile bombing dead") > 0.8);
    }

    #[test]
    fn test_risk_lowering_terms_floor_at_zero() {
        assert_eq!(value("peace agreement cooperation"), 0.0);
        assert_eq!(value("nothing relevant here"), 0.0);
    }

    #[test]
    fn test_headline_and_long_article_agree() {
        let headline = value("Missile strikes kill dozens");
        let padding = "officials said the situation remained under review ".repeat(40);
        let article = value(&format!("Missile strikes kill dozens. {}", padding));
        assert_eq!(headline, article);
    }

    #[test]
    fn test_more_matches_never_decrease_signal() {
        let mut text = String::from("protest");
        let mut previous = value(&text);
        for word in ["clashes", "troops", "shelling", "killed", "massacre", "killed"] {
            text.push(' ');
            text.push_str(word);
            let current = value(&text);
            assert!(current >= previous, "{} dropped below {}", current, previous);
            previous = current;
        }
    }

    #[test]
    fn test_higher_weight_never_decreases_signal() {
        let tokens = tokenize("border clashes reported");
        let mut previous = 0.0;
        for weight in [0.1, 0.3, 0.5, 0.8, 1.0] {
            let lexicon = KeywordLexicon::from_entries([("clashes", weight)]).unwrap();
            let (net, _) = KeywordExtractor::new(lexicon).net_contribution(&tokens);
            let current = saturate(net);
            assert!(current >= previous);
            previous = current;
        }
    }
}
