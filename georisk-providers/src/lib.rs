//! GeoRisk Providers - remote classification with a guaranteed local fallback
//!
//! - **Backends**: OpenAI-compatible, Anthropic and Ollama behind one `LlmBackend` trait
//! - **Prompt**: the embedded classification template
//! - **Chain**: priority-ordered providers with timeouts, retries and race mode
//! - **Service**: explicit init/shutdown around the chain, built from TOML config

pub mod backend;
pub mod prompt;
pub mod chain;
pub mod config;
pub mod service;

pub use backend::*;
pub use prompt::*;
pub use chain::*;
pub use config::*;
pub use service::*;
