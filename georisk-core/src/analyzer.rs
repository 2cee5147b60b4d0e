//! Local analyzer - the guaranteed fallback path
//!
//! Runs the five extractors, fuses their signals and renders a `RiskResult`.
//! Everything here is a pure function of the article and the tables loaded at
//! construction; the only non-deterministic field of the output is
//! `analyzed_at`.

use chrono::Utc;
use std::collections::BTreeMap;
use tracing::debug;

use crate::text::tokenize;
use crate::{
    extract_signal, normalize_result, AnalysisDetail, ArticleInput, CategoryExtractor, ConfigError,
    EscalationExtractor, ExtractionContext, FusedScore, FusionConfig, GeographicExtractor,
    KeywordExtractor, ReasoningComposer, RiskFusionEngine, RiskResult, SentimentExtractor, Signal,
    SignalExtractor, SignalKind, Tables, FALLBACK_PROVIDER, LOCAL_CONFIDENCE_CAP,
};

/// Signals and fused score of one local analysis
#[derive(Debug, Clone, PartialEq)]
pub struct LocalAnalysis {
    pub signals: Vec<Signal>,
    pub fused: FusedScore,
    pub contributions: Vec<(SignalKind, f64)>,
    pub confidence: f64,
}

impl LocalAnalysis {
    pub fn signal(&self, kind: SignalKind) -> Option<&Signal> {
        self.signals.iter().find(|s| s.name == kind)
    }

    pub fn signal_map(&self) -> BTreeMap<String, f64> {
        signal_map(&self.signals)
    }

    pub fn detail(&self) -> AnalysisDetail {
        let label = |kind| self.signal(kind).filter(|s| !s.is_degraded()).and_then(|s| s.label.clone());

        AnalysisDetail {
            category: label(SignalKind::Category),
            region: label(SignalKind::Geographic),
            matched_keywords: self
                .signal(SignalKind::Keyword)
                .map(|s| s.evidence.clone())
                .unwrap_or_default(),
            degraded: self
                .signals
                .iter()
                .filter_map(|s| s.degraded.as_ref().map(|why| format!("{}: {}", s.name, why)))
                .collect(),
        }
    }
}

fn signal_map(signals: &[Signal]) -> BTreeMap<String, f64> {
    signals
        .iter()
        .map(|s| (s.name.as_str().to_string(), s.value))
        .collect()
}

/// Confidence of a locally fused score
///
/// Scores far from the midpoint are more decisive; each degraded signal
/// removes up to half of its share.
pub fn local_confidence(score: f64, degraded: usize, total: usize) -> f64 {
    let degraded_fraction = if total == 0 { 1.0 } else { degraded as f64 / total as f64 };
    let decisiveness = 0.5 + (score - 0.5).abs();
    (decisiveness * (1.0 - 0.5 * degraded_fraction)).clamp(0.0, LOCAL_CONFIDENCE_CAP)
}

/// Extractors plus fusion engine, built once and shared across analyses
pub struct LocalAnalyzer {
    extractors: Vec<Box<dyn SignalExtractor>>,
    engine: RiskFusionEngine,
    composer: ReasoningComposer,
}

impl LocalAnalyzer {
    /// Standard five-extractor analyzer over the given tables
    pub fn new(tables: Tables, fusion: FusionConfig) -> Result<Self, ConfigError> {
        let extractors: Vec<Box<dyn SignalExtractor>> = vec![
            Box::new(SentimentExtractor::new(tables.sentiment)),
            Box::new(CategoryExtractor::new(tables.categories)),
            Box::new(KeywordExtractor::new(tables.keywords)),
            Box::new(GeographicExtractor::new(tables.countries)),
            Box::new(EscalationExtractor::new(tables.escalation)),
        ];
        Ok(Self::with_extractors(extractors, RiskFusionEngine::new(fusion)?))
    }

    /// Analyzer over a custom extractor set
    pub fn with_extractors(extractors: Vec<Box<dyn SignalExtractor>>, engine: RiskFusionEngine) -> Self {
        Self {
            extractors,
            engine,
            composer: ReasoningComposer::default(),
        }
    }

    pub fn with_composer(mut self, composer: ReasoningComposer) -> Self {
        self.composer = composer;
        self
    }

    pub fn engine(&self) -> &RiskFusionEngine {
        &self.engine
    }

    pub fn composer(&self) -> &ReasoningComposer {
        &self.composer
    }

    /// Extract and fuse all signals
    pub fn analyze(&self, article: &ArticleInput) -> LocalAnalysis {
        let text = article.full_text();
        let tokens = tokenize(&text);
        let ctx = ExtractionContext {
            text: &text,
            tokens: &tokens,
            country: article.country(),
            language: article.language(),
        };

        let signals: Vec<Signal> = self
            .extractors
            .iter()
            .map(|extractor| extract_signal(extractor.as_ref(), &ctx))
            .collect();

        let map = signal_map(&signals);
        let fused = self.engine.fuse(&map);
        let contributions = self.engine.contributions(&map);
        let degraded = signals.iter().filter(|s| s.is_degraded()).count();
        let confidence = local_confidence(fused.score, degraded, signals.len());

        debug!(
            score = fused.score,
            level = %fused.level,
            degraded,
            "Local analysis complete"
        );

        LocalAnalysis { signals, fused, contributions, confidence }
    }

    /// Render a local analysis as the fallback result
    pub fn to_result(&self, analysis: &LocalAnalysis) -> RiskResult {
        normalize_result(RiskResult {
            level: analysis.fused.level,
            score: analysis.fused.score,
            confidence: analysis.confidence,
            reasoning: self.composer.compose_local(&analysis.signals, &analysis.contributions),
            signals: analysis.signal_map(),
            provider_used: FALLBACK_PROVIDER.to_string(),
            ai_powered: false,
            model: None,
            analyzed_at: Utc::now(),
            detail: analysis.detail(),
        })
    }

    /// Analyze and render in one step
    pub fn analyze_to_result(&self, article: &ArticleInput) -> RiskResult {
        self.to_result(&self.analyze(article))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExtractorError, RiskLevel, SignalReading};

    fn analyzer() -> LocalAnalyzer {
        LocalAnalyzer::new(Tables::load_embedded().unwrap(), FusionConfig::default()).unwrap()
    }

    fn scenario_a() -> ArticleInput {
        ArticleInput::new(
            "Military forces launch missile strikes near capital",
            "Dozens reported dead after overnight bombing campaign intensifies",
        )
        .with_country("Ukraine")
    }

    fn scenario_b() -> ArticleInput {
        ArticleInput::new(
            "Trade ministers sign cooperation agreement",
            "The agreement strengthens bilateral economic ties",
        )
        .with_country("Switzerland")
    }

    #[test]
    fn test_scenario_a_is_high() {
        let result = analyzer().analyze_to_result(&scenario_a());
        assert_eq!(result.level, RiskLevel::High);
        assert!(result.score >= 0.7, "score {}", result.score);
        assert_eq!(result.provider_used, FALLBACK_PROVIDER);
        assert!(!result.ai_powered);
        assert_eq!(result.detail.category.as_deref(), Some("armed conflict"));
    }

    #[test]
    fn test_scenario_b_is_low() {
        let result = analyzer().analyze_to_result(&scenario_b());
        assert_eq!(result.level, RiskLevel::Low);
        assert!(result.score < 0.4, "score {}", result.score);
    }

    #[test]
    fn test_scenario_c_title_only() {
        let article = ArticleInput::new("Economic summit opens in Geneva", "");
        let result = analyzer().analyze_to_result(&article);
        assert!(result.detail.degraded.is_empty());
        assert_eq!(result.signal(SignalKind::Geographic), Some(0.5));
        assert!((0.0..=1.0).contains(&result.score));
    }

    #[test]
    fn test_empty_article_still_produces_result() {
        let result = analyzer().analyze_to_result(&ArticleInput::default());
        assert_eq!(result.signals.len(), 5);
        assert!(!result.detail.degraded.is_empty());
        assert!(!result.reasoning.is_empty());
        assert!((0.0..=1.0).contains(&result.confidence));
    }

    #[test]
    fn test_composer_limits_cited_signals() {
        let full = analyzer().analyze_to_result(&scenario_a());
        assert!(full.reasoning.matches("; ").count() >= 2, "{}", full.reasoning);

        let brief = analyzer().with_composer(ReasoningComposer::new(1));
        let result = brief.analyze_to_result(&scenario_a());
        assert!(!result.reasoning.contains("; "), "{}", result.reasoning);
    }

    #[test]
    fn test_unknown_country_is_neutral() {
        let article = scenario_a().with_country("Republic of Nowhere");
        let result = analyzer().analyze_to_result(&article);
        assert_eq!(result.signal(SignalKind::Geographic), Some(0.5));
    }

    #[test]
    fn test_local_path_is_bit_identical() {
        let first = analyzer().analyze(&scenario_a());
        let second = analyzer().analyze(&scenario_a());
        assert_eq!(first.fused.score.to_bits(), second.fused.score.to_bits());
        assert_eq!(first.confidence.to_bits(), second.confidence.to_bits());
        assert_eq!(first, second);

        let a = analyzer().to_result(&first);
        let b = analyzer().to_result(&second);
        assert_eq!(a.reasoning, b.reasoning);
        assert_eq!(a.signals, b.signals);
    }

    #[test]
    fn test_all_signals_and_bounds() {
        let result = analyzer().analyze_to_result(&scenario_a());
        for kind in SignalKind::ALL {
            let value = result.signal(kind).expect("signal present");
            assert!((0.0..=1.0).contains(&value), "{} = {}", kind, value);
        }
        assert!(result.confidence <= LOCAL_CONFIDENCE_CAP);
    }

    struct Failing;

    impl SignalExtractor for Failing {
        fn kind(&self) -> SignalKind {
            SignalKind::Sentiment
        }

        fn extract(&self, _ctx: &ExtractionContext<'_>) -> Result<SignalReading, ExtractorError> {
            Err(ExtractorError::Internal("sentiment model offline".to_string()))
        }
    }

    #[test]
    fn test_failing_extractor_degrades_only_its_signal() {
        let tables = Tables::load_embedded().unwrap();
        let extractors: Vec<Box<dyn SignalExtractor>> = vec![
            Box::new(Failing),
            Box::new(KeywordExtractor::new(tables.keywords)),
        ];
        let engine = RiskFusionEngine::new(FusionConfig::default()).unwrap();
        let analyzer = LocalAnalyzer::with_extractors(extractors, engine);

        let analysis = analyzer.analyze(&scenario_a());
        assert_eq!(analysis.signal(SignalKind::Sentiment).unwrap().value, 0.5);
        assert!(analysis.signal(SignalKind::Keyword).unwrap().value > 0.8);

        let result = analyzer.to_result(&analysis);
        assert!(result.reasoning.contains("sentiment model offline"));
        assert_eq!(result.detail.degraded, vec!["sentiment: sentiment model offline"]);
    }

    #[test]
    fn test_confidence_penalized_by_degradation() {
        assert!(local_confidence(0.9, 2, 5) < local_confidence(0.9, 0, 5));
        assert_eq!(local_confidence(0.99, 0, 5), LOCAL_CONFIDENCE_CAP);
    }
}
