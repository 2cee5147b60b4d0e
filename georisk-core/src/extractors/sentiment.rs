//! Sentiment signal
//!
//! Lexicon-based polarity: per-token valences with negation and intensifier
//! handling, normalized per chunk with `s / sqrt(s² + α)`. Long texts are split
//! into fixed-size token chunks whose compounds are averaged by token count.
//! Negative polarity raises the signal, positive polarity lowers it.

use crate::{SentimentLexicon, SignalKind};

use super::{ExtractionContext, ExtractorError, SignalExtractor, SignalReading};

/// Tokens per sentiment chunk
pub const SENTIMENT_CHUNK_TOKENS: usize = 256;

/// Normalization constant of the compound score
const ALPHA: f64 = 15.0;

/// Tokens after a negation that get flipped
const NEGATION_WINDOW: usize = 3;

/// Scale applied to a negated valence
const NEGATION_SCALAR: f64 = -0.74;

pub struct SentimentExtractor {
    lexicon: SentimentLexicon,
}

impl SentimentExtractor {
    pub fn new(lexicon: SentimentLexicon) -> Self {
        Self { lexicon }
    }

    /// Compound polarity in [-1, 1] plus the words that carried it
    pub fn compound(&self, tokens: &[String]) -> (f64, Vec<String>) {
        let mut weighted = 0.0;
        let mut evidence = Vec::new();

        for chunk in tokens.chunks(SENTIMENT_CHUNK_TOKENS) {
            let sum = self.chunk_sum(chunk, &mut evidence);
            let compound = sum / (sum * sum + ALPHA).sqrt();
            weighted += compound * chunk.len() as f64;
        }

        (weighted / tokens.len() as f64, evidence)
    }

    fn chunk_sum(&self, chunk: &[String], evidence: &mut Vec<String>) -> f64 {
        let mut sum = 0.0;

        for (i, token) in chunk.iter().enumerate() {
            let Some(mut valence) = self.lexicon.valence(token) else {
                continue;
            };

            if let Some(boost) = i.checked_sub(1).and_then(|p| self.lexicon.intensifier(&chunk[p])) {
                valence += valence.signum() * boost;
            }

            let window_start = i.saturating_sub(NEGATION_WINDOW);
            if chunk[window_start..i].iter().any(|t| self.lexicon.is_negation(t)) {
                valence *= NEGATION_SCALAR;
            }

            if !evidence.contains(token) {
                evidence.push(token.clone());
            }
            sum += valence;
        }

        sum
    }
}

fn polarity_label(compound: f64) -> &'static str {
    if compound <= -0.5 {
        "strongly negative"
    } else if compound <= -0.05 {
        "negative"
    } else if compound < 0.05 {
        "neutral"
    } else if compound < 0.5 {
        "positive"
    } else {
        "strongly positive"
    }
}

impl SignalExtractor for SentimentExtractor {
    fn kind(&self) -> SignalKind {
        SignalKind::Sentiment
    }

    fn extract(&self, ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
        if ctx.tokens.is_empty() {
            return Err(ExtractorError::EmptyInput);
        }

        let (compound, evidence) = self.compound(ctx.tokens);
        Ok(SignalReading::new((1.0 - compound) / 2.0)
            .with_label(polarity_label(compound))
            .with_evidence(evidence))
    }
}
