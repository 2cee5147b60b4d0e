//! Service configuration
//!
//! One TOML document describes the analyzer (fusion weights, thresholds,
//! optional table overrides), the chain (content budget, mode, deadline) and
//! the ordered provider list. Credentials never live in the file; each
//! provider names the environment variable holding its key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use georisk_core::{
    CategoryTaxonomy, ConfigError, CountryRiskTable, EscalationVocabulary, FusionConfig,
    FusionWeights, KeywordLexicon, SentimentLexicon, TableError, Tables, Thresholds,
    DEFAULT_CONTENT_BUDGET,
};

use crate::{
    create_anthropic_backend, create_backend, create_ollama_backend, AnthropicConfig, ChainMode,
    LlmError, OllamaConfig, OpenAIBackendConfig, PromptError, SharedBackend,
};

/// Service construction errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid service config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Fusion(#[from] ConfigError),

    #[error(transparent)]
    Table(#[from] TableError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Failed to build provider {provider}: {source}")]
    Backend {
        provider: String,
        #[source]
        source: LlmError,
    },

    #[error("Invalid service config: {0}")]
    Invalid(String),
}

fn read_file(path: &Path) -> Result<String, ServiceError> {
    std::fs::read_to_string(path).map_err(|source| ServiceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Remote provider flavors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Openai,
    Openrouter,
    OpenaiCompatible,
    Anthropic,
    Ollama,
}

/// Credential state of a provider after consulting the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    NotRequired,
    Present(String),
    Missing,
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_retries() -> u32 {
    2
}

fn default_backoff_base_ms() -> u64 {
    250
}

fn default_max_tokens() -> u16 {
    300
}

fn default_enabled() -> bool {
    true
}

/// One `[[providers]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub kind: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Lower runs first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u16,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl ProviderConfig {
    pub fn new(name: &str, kind: ProviderKind, model: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            model: model.to_string(),
            base_url: None,
            api_key_env: None,
            priority: 0,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            temperature: 0.0,
            max_tokens: default_max_tokens(),
            enabled: true,
        }
    }

    pub fn with_api_key_env(mut self, var: &str) -> Self {
        self.api_key_env = Some(var.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    /// Look up the provider's key in the environment
    pub fn credential(&self) -> Credential {
        self.credential_from(|var| std::env::var(var).ok())
    }

    /// Same as [`credential`](Self::credential) with an injectable lookup
    pub fn credential_from<F>(&self, lookup: F) -> Credential
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = self
            .api_key_env
            .as_deref()
            .and_then(|var| lookup(var))
            .filter(|value| !value.trim().is_empty());

        match (key, self.kind) {
            (Some(key), _) => Credential::Present(key),
            (None, ProviderKind::Ollama) => Credential::NotRequired,
            (None, ProviderKind::OpenaiCompatible) if self.api_key_env.is_none() => Credential::NotRequired,
            (None, _) => Credential::Missing,
        }
    }

    /// Build the backend; `api_key` is `None` for credential-free providers
    pub fn build_backend(&self, api_key: Option<&str>) -> Result<SharedBackend, LlmError> {
        let key = api_key.unwrap_or_default();

        match self.kind {
            ProviderKind::Openai | ProviderKind::Openrouter | ProviderKind::OpenaiCompatible => {
                let mut config = match self.kind {
                    ProviderKind::Openrouter => OpenAIBackendConfig::openrouter(key, &self.model),
                    ProviderKind::OpenaiCompatible => {
                        let base_url = self.base_url.as_deref().ok_or_else(|| {
                            LlmError::Config("openai_compatible providers need a base_url".to_string())
                        })?;
                        let mut config = OpenAIBackendConfig::local(base_url, &self.model);
                        if api_key.is_some() {
                            config.api_key = key.to_string();
                        }
                        config
                    }
                    _ => OpenAIBackendConfig::openai(key, &self.model),
                };
                if let Some(base_url) = &self.base_url {
                    config.base_url = Some(base_url.clone());
                }
                create_backend(
                    config
                        .with_temperature(self.temperature)
                        .with_max_tokens(self.max_tokens),
                )
            }
            ProviderKind::Anthropic => {
                let mut config = AnthropicConfig::new(key, &self.model);
                if let Some(base_url) = &self.base_url {
                    config = config.with_base_url(base_url);
                }
                config.max_tokens = u32::from(self.max_tokens);
                config.temperature = self.temperature;
                create_anthropic_backend(config)
            }
            ProviderKind::Ollama => {
                let mut config = OllamaConfig::new(self.base_url.as_deref(), &self.model);
                config.max_tokens = u32::from(self.max_tokens);
                config.temperature = self.temperature;
                create_ollama_backend(config)
            }
        }
    }
}

/// Replacement table files; unset entries use the embedded tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOverrides {
    pub keywords: Option<PathBuf>,
    pub sentiment: Option<PathBuf>,
    pub categories: Option<PathBuf>,
    pub countries: Option<PathBuf>,
    pub escalation: Option<PathBuf>,
}

impl TableOverrides {
    pub fn load(&self) -> Result<Tables, ServiceError> {
        let mut tables = Tables::load_embedded()?;

        if let Some(path) = &self.keywords {
            tables.keywords = KeywordLexicon::from_toml_str(&read_file(path)?)?;
        }
        if let Some(path) = &self.sentiment {
            tables.sentiment = SentimentLexicon::from_toml_str(&read_file(path)?)?;
        }
        if let Some(path) = &self.categories {
            tables.categories = CategoryTaxonomy::from_toml_str(&read_file(path)?)?;
        }
        if let Some(path) = &self.countries {
            tables.countries = CountryRiskTable::from_toml_str(&read_file(path)?)?;
        }
        if let Some(path) = &self.escalation {
            tables.escalation = EscalationVocabulary::from_toml_str(&read_file(path)?)?;
        }
        Ok(tables)
    }
}

/// `[analyzer]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerSection {
    /// Signals cited in local reasoning text
    pub reasoning_items: Option<usize>,
    pub weights: FusionWeights,
    pub thresholds: Thresholds,
    pub tables: TableOverrides,
}

impl AnalyzerSection {
    pub fn fusion(&self) -> FusionConfig {
        FusionConfig {
            weights: self.weights,
            thresholds: self.thresholds,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainModeKind {
    #[default]
    Sequential,
    Race,
}

/// `[chain]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainSection {
    /// Characters of content sent to providers
    pub content_budget: usize,
    pub mode: ChainModeKind,
    /// Providers raced at once in `race` mode
    pub race_width: usize,
    /// Default per-analysis deadline
    pub deadline_ms: Option<u64>,
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            content_budget: DEFAULT_CONTENT_BUDGET,
            mode: ChainModeKind::Sequential,
            race_width: 2,
            deadline_ms: None,
        }
    }
}

impl ChainSection {
    pub fn mode(&self) -> ChainMode {
        match self.mode {
            ChainModeKind::Sequential => ChainMode::Sequential,
            ChainModeKind::Race => ChainMode::Race { width: self.race_width },
        }
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub analyzer: AnalyzerSection,
    pub chain: ChainSection,
    pub providers: Vec<ProviderConfig>,
}

impl ServiceConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ServiceError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServiceError> {
        Self::from_toml_str(&read_file(path.as_ref())?)
    }

    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        self.analyzer.fusion().validate()?;

        if self.chain.content_budget == 0 {
            return Err(ServiceError::Invalid("chain.content_budget must be positive".to_string()));
        }
        if self.chain.mode == ChainModeKind::Race && self.chain.race_width == 0 {
            return Err(ServiceError::Invalid("chain.race_width must be at least 1".to_string()));
        }

        let mut names = BTreeSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(ServiceError::Invalid("provider name must not be empty".to_string()));
            }
            if !names.insert(provider.name.as_str()) {
                return Err(ServiceError::Invalid(format!("duplicate provider name: {}", provider.name)));
            }
            if provider.timeout_secs == 0 {
                return Err(ServiceError::Invalid(format!("provider {} has a zero timeout", provider.name)));
            }
        }
        Ok(())
    }
}
