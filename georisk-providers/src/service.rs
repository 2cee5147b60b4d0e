//! Risk service
//!
//! The object callers hold: built once from a `ServiceConfig`, shared across
//! tasks, and shut down explicitly. Shutdown cancels in-flight provider calls
//! so every pending analysis returns its local result.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use georisk_core::{ArticleInput, LocalAnalyzer, ReasoningComposer, RiskResult};

use crate::{
    AnalyzeOptions, Credential, ProviderChain, ProviderDescriptor, ProviderInfo, PromptTemplate,
    ServiceConfig, ServiceError,
};

pub struct RiskService {
    chain: ProviderChain,
    default_deadline: Option<Duration>,
    shutdown: CancellationToken,
}

impl RiskService {
    /// Load tables, validate weights and build every configured provider
    pub fn init(config: ServiceConfig) -> Result<Self, ServiceError> {
        config.validate()?;

        let tables = config.analyzer.tables.load()?;
        let mut analyzer = LocalAnalyzer::new(tables, config.analyzer.fusion())?;
        if let Some(items) = config.analyzer.reasoning_items {
            analyzer = analyzer.with_composer(ReasoningComposer::new(items));
        }
        let analyzer = Arc::new(analyzer);
        let template = PromptTemplate::embedded()?;

        let mut providers = Vec::new();
        for provider in config.providers.iter().filter(|p| p.enabled) {
            let key = match provider.credential() {
                Credential::Present(key) => Some(key),
                Credential::NotRequired => None,
                Credential::Missing => {
                    info!(
                        provider = %provider.name,
                        api_key_env = provider.api_key_env.as_deref().unwrap_or("<unset>"),
                        "No credential, provider disabled"
                    );
                    providers.push(ProviderDescriptor::unavailable(&provider.name, provider.priority));
                    continue;
                }
            };

            let backend = provider
                .build_backend(key.as_deref())
                .map_err(|source| ServiceError::Backend {
                    provider: provider.name.clone(),
                    source,
                })?;

            providers.push(
                ProviderDescriptor::new(&provider.name, provider.priority, backend)
                    .with_timeout(provider.timeout())
                    .with_max_retries(provider.max_retries)
                    .with_backoff_base(provider.backoff_base()),
            );
        }

        let chain = ProviderChain::new(analyzer, template, providers)
            .with_content_budget(config.chain.content_budget)
            .with_mode(config.chain.mode());

        let service = Self::with_chain(chain).with_default_deadline(config.chain.deadline());
        for info in service.providers() {
            debug!(
                provider = %info.name,
                priority = info.priority,
                available = info.available,
                model = info.model.as_deref().unwrap_or("-"),
                "Provider registered"
            );
        }
        Ok(service)
    }

    /// Wrap a prebuilt chain
    pub fn with_chain(chain: ProviderChain) -> Self {
        Self {
            chain,
            default_deadline: None,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_default_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.default_deadline = deadline;
        self
    }

    /// Classify with the configured default deadline
    pub async fn analyze(&self, article: &ArticleInput) -> RiskResult {
        self.analyze_with(article, AnalyzeOptions::default()).await
    }

    /// Classify with caller-supplied deadline and cancellation
    pub async fn analyze_with(&self, article: &ArticleInput, mut options: AnalyzeOptions) -> RiskResult {
        if options.deadline.is_none() {
            options.deadline = self.default_deadline;
        }
        if self.shutdown.is_cancelled() {
            return self.chain.analyze_local(article);
        }

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => self.chain.analyze_local(article),
            result = self.chain.analyze(article, options) => result,
        }
    }

    /// Deterministic local path only
    pub fn analyze_local(&self, article: &ArticleInput) -> RiskResult {
        self.chain.analyze_local(article)
    }

    /// Providers in the order they are tried
    pub fn providers(&self) -> Vec<ProviderInfo> {
        self.chain.providers().iter().map(ProviderDescriptor::info).collect()
    }

    pub fn chain(&self) -> &ProviderChain {
        &self.chain
    }

    /// Abort in-flight provider calls; later analyses run locally
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Risk service shutting down");
            self.shutdown.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LlmBackend, LlmError, ProviderConfig, ProviderKind};
    use async_trait::async_trait;
    use georisk_core::{FusionConfig, RiskLevel, Tables, FALLBACK_PROVIDER};

    struct Hanging;

    #[async_trait]
    impl LlmBackend for Hanging {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String, LlmError> {
            std::future::pending().await
        }

        fn model_name(&self) -> &str {
            "hanging"
        }
    }

    fn scenario_b() -> ArticleInput {
        ArticleInput::new(
            "Trade ministers sign cooperation agreement",
            "The agreement strengthens bilateral economic ties",
        )
        .with_country("Switzerland")
    }

    fn hanging_chain() -> ProviderChain {
        let analyzer = Arc::new(LocalAnalyzer::new(Tables::load_embedded().unwrap(), FusionConfig::default()).unwrap());
        let provider = ProviderDescriptor::new("hanging", 1, Arc::new(Hanging)).with_timeout(Duration::from_secs(60));
        ProviderChain::new(analyzer, PromptTemplate::embedded().unwrap(), vec![provider])
    }

    #[tokio::test]
    async fn test_init_without_credentials_runs_locally() {
        let config = ServiceConfig::default()
            .with_provider(
                ProviderConfig::new("openai", ProviderKind::Openai, "gpt-4o-mini")
                    .with_api_key_env("GEORISK_TEST_UNSET_OPENAI_KEY")
                    .with_priority(1),
            )
            .with_provider(
                ProviderConfig::new("anthropic", ProviderKind::Anthropic, "claude-3-5-haiku-20241022")
                    .with_api_key_env("GEORISK_TEST_UNSET_ANTHROPIC_KEY")
                    .with_priority(2),
            );
        let service = RiskService::init(config).unwrap();

        let providers = service.providers();
        assert_eq!(providers.len(), 2);
        assert!(providers.iter().all(|p| !p.available));
        assert_eq!(providers[0].name, "openai");

        let result = service.analyze(&scenario_b()).await;
        assert_eq!(result.provider_used, FALLBACK_PROVIDER);
        assert!(!result.ai_powered);
        assert_eq!(result.level, RiskLevel::Low);
    }

    #[test]
    fn test_disabled_providers_are_not_registered() {
        let mut disabled = ProviderConfig::new("ollama", ProviderKind::Ollama, "llama3");
        disabled.enabled = false;
        let service = RiskService::init(ServiceConfig::default().with_provider(disabled)).unwrap();
        assert!(service.providers().is_empty());
    }

    #[test]
    fn test_credential_free_provider_is_available() {
        let config = ServiceConfig::default()
            .with_provider(ProviderConfig::new("ollama", ProviderKind::Ollama, "llama3"));
        let service = RiskService::init(config).unwrap();
        let providers = service.providers();
        assert!(providers[0].available);
        assert_eq!(providers[0].model.as_deref(), Some("llama3"));
    }

    #[test]
    fn test_reasoning_items_from_config() {
        let mut config = ServiceConfig::default();
        config.analyzer.reasoning_items = Some(1);
        let service = RiskService::init(config).unwrap();

        let article = ArticleInput::new(
            "Military forces launch missile strikes near capital",
            "Dozens reported dead after overnight bombing campaign intensifies",
        )
        .with_country("Ukraine");
        let result = service.analyze_local(&article);
        assert!(!result.reasoning.contains("; "), "{}", result.reasoning);
    }

    #[test]
    fn test_init_rejects_bad_fusion_config() {
        let mut config = ServiceConfig::default();
        config.analyzer.thresholds.medium = 0.9;
        assert!(matches!(RiskService::init(config), Err(ServiceError::Fusion(_))));
    }

    #[tokio::test]
    async fn test_default_deadline_applies() {
        let service = RiskService::with_chain(hanging_chain())
            .with_default_deadline(Some(Duration::from_millis(30)));

        let result = service.analyze(&scenario_b()).await;
        assert_eq!(result.provider_used, FALLBACK_PROVIDER);
    }

    #[tokio::test]
    async fn test_shutdown_releases_pending_analyses() {
        let service = Arc::new(RiskService::with_chain(hanging_chain()));

        let worker = Arc::clone(&service);
        let pending = tokio::spawn(async move { worker.analyze(&scenario_b()).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        service.shutdown();

        let result = pending.await.unwrap();
        assert_eq!(result.provider_used, FALLBACK_PROVIDER);
        assert!(service.is_shut_down());

        let after = service.analyze(&scenario_b()).await;
        assert_eq!(after.provider_used, FALLBACK_PROVIDER);
    }

    #[tokio::test]
    async fn test_concurrent_analyses_share_service() {
        let service = Arc::new(RiskService::init(ServiceConfig::default()).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.analyze(&scenario_b()).await.score })
            })
            .collect();

        let scores: Vec<f64> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();
        assert!(scores.windows(2).all(|w| w[0].to_bits() == w[1].to_bits()));
    }
}
