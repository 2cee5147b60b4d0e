//! Provider fallback chain
//!
//! `PENDING → TRYING_PROVIDER(i) → {SUCCESS(i) | RETRY(i) | ADVANCE(i+1)} → … →
//! LOCAL_FALLBACK → SUCCESS`
//!
//! - Providers are tried by ascending priority; unavailable ones are skipped
//! - Each attempt is bounded by the provider's timeout
//! - Timeouts and transport errors are retried on the same provider with
//!   exponential backoff; different providers are advanced to immediately
//! - A response is salvage-parsed and validated once; failure advances
//! - A caller deadline or cancellation drops the in-flight call and returns
//!   the local result
//!
//! `analyze` always returns a `RiskResult`.

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use georisk_core::text::preview;
use georisk_core::{
    normalize_result, salvage_json, validate_object, ArticleInput, LocalAnalysis, LocalAnalyzer,
    RiskResult, SalvageError, ValidatedVerdict, ValidationError, DEFAULT_CONTENT_BUDGET,
};

use crate::{LlmError, Prompt, PromptTemplate, SharedBackend};

/// Characters of a provider response body kept in logs
const LOGGED_BODY_CHARS: usize = 200;

/// Longest single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(4);

/// How the chain walks its providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainMode {
    /// One provider at a time, in priority order
    Sequential,
    /// Race the top `width` available providers, then continue sequentially
    Race { width: usize },
}

/// Why a provider did not produce a verdict
#[derive(Debug, Error)]
pub enum ProviderFailure {
    #[error("provider has no credential")]
    Unavailable,

    #[error("timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("call failed after {attempts} attempt(s): {source}")]
    Call {
        attempts: u32,
        #[source]
        source: LlmError,
    },

    #[error("no JSON object in response: {0}")]
    Unsalvageable(#[from] SalvageError),

    #[error("response failed validation: {0}")]
    Invalid(#[from] ValidationError),
}

/// One remote provider as seen by the chain
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub name: String,
    pub priority: i32,
    /// False when the provider's credential is missing
    pub available: bool,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_base: Duration,
    backend: Option<SharedBackend>,
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("available", &self.available)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("model", &self.model())
            .finish()
    }
}

impl ProviderDescriptor {
    /// A provider ready to be called
    pub fn new(name: &str, priority: i32, backend: SharedBackend) -> Self {
        Self {
            name: name.to_string(),
            priority,
            available: true,
            timeout: Duration::from_secs(20),
            max_retries: 2,
            backoff_base: Duration::from_millis(250),
            backend: Some(backend),
        }
    }

    /// A configured provider whose credential is absent
    pub fn unavailable(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            available: false,
            timeout: Duration::from_secs(20),
            max_retries: 0,
            backoff_base: Duration::from_millis(250),
            backend: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: Duration) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.model_name())
    }

    /// Send the prompt and return the raw response text
    pub async fn call(&self, prompt: &Prompt) -> Result<String, LlmError> {
        match &self.backend {
            Some(backend) if self.available => backend.generate(&prompt.system, &prompt.user).await,
            _ => Err(LlmError::Config(format!("provider {} is unavailable", self.name))),
        }
    }

    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            priority: self.priority,
            available: self.available,
            timeout_ms: self.timeout.as_millis() as u64,
            max_retries: self.max_retries,
            model: self.model().map(str::to_string),
        }
    }
}

/// Serializable snapshot of a provider for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub priority: i32,
    pub available: bool,
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub model: Option<String>,
}

/// Per-call controls
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Wall-clock budget for the remote phase
    pub deadline: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl AnalyzeOptions {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// A validated verdict and the provider that produced it
#[derive(Debug, Clone)]
struct RemoteVerdict {
    provider: String,
    model: Option<String>,
    verdict: ValidatedVerdict,
}

/// Sleep before retry `attempt` (0-based): `base · 2^attempt`, capped, plus jitter
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exponential = base.saturating_mul(2u32.saturating_pow(attempt)).min(MAX_BACKOFF);
    let jitter_ms = exponential.as_millis() as u64 / 4;
    let jitter = if jitter_ms > 0 {
        rand::thread_rng().gen_range(0..=jitter_ms)
    } else {
        0
    };
    exponential + Duration::from_millis(jitter)
}

/// Salvage and validate one raw response
pub fn parse_response(raw: &str) -> Result<ValidatedVerdict, ProviderFailure> {
    let object = salvage_json(raw)?;
    Ok(validate_object(&object)?)
}

/// Ordered providers plus the local fallback
pub struct ProviderChain {
    providers: Vec<ProviderDescriptor>,
    analyzer: Arc<LocalAnalyzer>,
    template: PromptTemplate,
    content_budget: usize,
    mode: ChainMode,
}

impl ProviderChain {
    pub fn new(analyzer: Arc<LocalAnalyzer>, template: PromptTemplate, mut providers: Vec<ProviderDescriptor>) -> Self {
        // Stable: equal priorities keep configuration order
        providers.sort_by_key(|p| p.priority);
        Self {
            providers,
            analyzer,
            template,
            content_budget: DEFAULT_CONTENT_BUDGET,
            mode: ChainMode::Sequential,
        }
    }

    pub fn with_content_budget(mut self, budget: usize) -> Self {
        self.content_budget = budget.max(1);
        self
    }

    pub fn with_mode(mut self, mode: ChainMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    pub fn analyzer(&self) -> &LocalAnalyzer {
        &self.analyzer
    }

    pub fn mode(&self) -> ChainMode {
        self.mode
    }

    /// Classify an article; never fails
    pub async fn analyze(&self, article: &ArticleInput, options: AnalyzeOptions) -> RiskResult {
        let fingerprint = article.fingerprint();
        let local = self.analyzer.analyze(article);
        let prompt = self.template.render(article, self.content_budget);

        let AnalyzeOptions { deadline, cancel } = options;
        let cancel = cancel.unwrap_or_default();
        let expired = async move {
            match deadline {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let remote = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(article = %fingerprint, "Analysis cancelled, aborting provider calls");
                None
            }
            _ = expired => {
                warn!(
                    article = %fingerprint,
                    deadline_ms = deadline.map(|d| d.as_millis() as u64),
                    "Deadline reached, aborting provider calls"
                );
                None
            }
            verdict = self.run_providers(&prompt, &fingerprint) => verdict,
        };

        match remote {
            Some(remote) => {
                info!(
                    article = %fingerprint,
                    provider = %remote.provider,
                    level = %remote.verdict.level,
                    "Provider verdict accepted"
                );
                self.remote_result(remote, &local)
            }
            None => {
                info!(
                    article = %fingerprint,
                    level = %local.fused.level,
                    score = local.fused.score,
                    "Using local keyword fallback"
                );
                self.analyzer.to_result(&local)
            }
        }
    }

    /// Local path only
    pub fn analyze_local(&self, article: &ArticleInput) -> RiskResult {
        self.analyzer.analyze_to_result(article)
    }

    fn available(&self) -> Vec<&ProviderDescriptor> {
        self.providers
            .iter()
            .filter(|p| {
                if !p.available {
                    debug!(provider = %p.name, "Provider unavailable, skipping");
                }
                p.available
            })
            .collect()
    }

    async fn run_providers(&self, prompt: &Prompt, fingerprint: &str) -> Option<RemoteVerdict> {
        let available = self.available();

        let rest = match self.mode {
            ChainMode::Race { width } if width > 1 && available.len() > 1 => {
                let width = width.min(available.len());
                if let Some(verdict) = self.race(&available[..width], prompt, fingerprint).await {
                    return Some(verdict);
                }
                &available[width..]
            }
            _ => &available[..],
        };

        for provider in rest {
            match self.try_provider(provider, prompt, fingerprint).await {
                Ok(verdict) => return Some(verdict),
                Err(failure) => {
                    debug!(provider = %provider.name, reason = %failure, "Advancing to next provider");
                }
            }
        }

        debug!(article = %fingerprint, "All providers exhausted");
        None
    }

    /// First valid verdict among `raced`; ties go to the higher-priority provider
    async fn race(&self, raced: &[&ProviderDescriptor], prompt: &Prompt, fingerprint: &str) -> Option<RemoteVerdict> {
        let mut pending: FuturesUnordered<_> = raced
            .iter()
            .enumerate()
            .map(|(rank, provider)| async move {
                (rank, self.try_provider(provider, prompt, fingerprint).await)
            })
            .collect();

        let mut best: Option<(usize, RemoteVerdict)> = None;
        while let Some((rank, outcome)) = pending.next().await {
            if let Ok(verdict) = outcome {
                best = Some((rank, verdict));
                break;
            }
        }

        // Collect anything that finished in the same poll
        if best.is_some() {
            while let Some(Some((rank, outcome))) = pending.next().now_or_never() {
                let Ok(verdict) = outcome else { continue };
                if best.as_ref().map_or(true, |(best_rank, _)| rank < *best_rank) {
                    best = Some((rank, verdict));
                }
            }
        }

        if !pending.is_empty() {
            debug!(losers = pending.len(), "Cancelling raced providers");
        }
        drop(pending);

        best.map(|(_, verdict)| verdict)
    }

    /// All attempts on one provider
    async fn try_provider(
        &self,
        provider: &ProviderDescriptor,
        prompt: &Prompt,
        fingerprint: &str,
    ) -> Result<RemoteVerdict, ProviderFailure> {
        if !provider.available {
            return Err(ProviderFailure::Unavailable);
        }

        let max_attempts = provider.max_retries + 1;
        let mut last_failure = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(provider.backoff_base, attempt - 1);
                debug!(provider = %provider.name, attempt, delay_ms = delay.as_millis() as u64, "Retrying provider");
                tokio::time::sleep(delay).await;
            }

            let attempts = attempt + 1;
            match tokio::time::timeout(provider.timeout, provider.call(prompt)).await {
                Ok(Ok(raw)) => {
                    return match parse_response(&raw) {
                        Ok(verdict) => Ok(RemoteVerdict {
                            provider: provider.name.clone(),
                            model: provider.model().map(str::to_string),
                            verdict,
                        }),
                        Err(failure) => {
                            warn!(
                                article = %fingerprint,
                                provider = %provider.name,
                                attempt = attempts,
                                error = %failure,
                                body = %preview(&raw, LOGGED_BODY_CHARS),
                                "Malformed provider response"
                            );
                            Err(failure)
                        }
                    };
                }
                Ok(Err(error)) => {
                    warn!(
                        article = %fingerprint,
                        provider = %provider.name,
                        attempt = attempts,
                        max_retries = provider.max_retries,
                        error = %error,
                        body = %preview(error.body(), LOGGED_BODY_CHARS),
                        "Provider call failed"
                    );
                    let retryable = error.is_retryable();
                    last_failure = Some(ProviderFailure::Call { attempts, source: error });
                    if !retryable {
                        break;
                    }
                }
                Err(_) => {
                    warn!(
                        article = %fingerprint,
                        provider = %provider.name,
                        attempt = attempts,
                        max_retries = provider.max_retries,
                        timeout_ms = provider.timeout.as_millis() as u64,
                        "Provider call timed out"
                    );
                    last_failure = Some(ProviderFailure::Timeout { attempts });
                }
            }
        }

        Err(last_failure.unwrap_or(ProviderFailure::Timeout { attempts: max_attempts }))
    }

    fn remote_result(&self, remote: RemoteVerdict, local: &LocalAnalysis) -> RiskResult {
        let RemoteVerdict { provider, model, verdict } = remote;
        let reasoning = self.analyzer.composer().compose_remote(
            &provider,
            verdict.level,
            verdict.confidence,
            verdict.reasoning.as_deref(),
            &local.signals,
            &local.contributions,
        );

        normalize_result(RiskResult {
            level: verdict.level,
            score: verdict.score,
            confidence: verdict.confidence,
            reasoning,
            signals: local.signal_map(),
            provider_used: provider,
            ai_powered: true,
            model,
            analyzed_at: Utc::now(),
            detail: local.detail(),
        })
    }
}
