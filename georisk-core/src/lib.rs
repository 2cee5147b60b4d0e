//! GeoRisk Core - deterministic risk classification primitives
//!
//! This crate provides everything that does not need the network:
//! - Article input and the canonical `RiskResult` schema
//! - Static tables (keyword lexicon, sentiment lexicon, taxonomy, country tiers)
//! - Five signal extractors producing normalized [0,1] signals
//! - The weighted fusion engine and its thresholds
//! - Validation of provider JSON and salvage parsing of provider prose
//! - Reasoning composition and the `LocalAnalyzer` fallback path

pub mod article;
pub mod result;
pub mod text;
pub mod tables;
pub mod extractors;
pub mod fusion;
pub mod validate;
pub mod salvage;
pub mod reasoning;
pub mod analyzer;

pub use article::*;
pub use result::*;
pub use tables::*;
pub use extractors::*;
pub use fusion::*;
pub use validate::*;
pub use salvage::*;
pub use reasoning::*;
pub use analyzer::*;

/// Value a signal degrades to when its extractor cannot produce one
pub const NEUTRAL_SIGNAL: f64 = 0.5;

/// `provider_used` tag of results computed by the local path
pub const FALLBACK_PROVIDER: &str = "keyword_fallback";

/// Characters of article content placed into provider prompts
pub const DEFAULT_CONTENT_BUDGET: usize = 800;

/// Upper bound on the confidence the local path reports
pub const LOCAL_CONFIDENCE_CAP: f64 = 0.85;
