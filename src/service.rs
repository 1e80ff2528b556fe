// The single entry point callers use: cache lookup, fallback-coordinated
// generation, cache population.

use crate::cache::{CacheStats, TtlCache, cache_key};
use crate::config::{ConfigError, ServiceConfig};
use crate::fallback::{FallbackCoordinator, FallbackError};
use crate::provider::{GenerationRequest, GenerationResult, ProviderAdapter, build_adapter};
use crate::retry::RetryExecutor;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

const SECTION_KEY_PREFIX: &str = "section";

/// Error surface of `GenerationService`. The caller receives either a fully
/// populated result or exactly one of these, with enough context to log root
/// cause without retrying blindly.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generation(#[from] FallbackError),
}

/// Liveness snapshot of the configured adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub primary: bool,
    pub fallback: Option<bool>,
}

/// Orchestrates section generation: a TTL cache in front of retry-with-
/// fallback provider calls. Construct once at startup, inside a tokio
/// runtime (construction spawns the cache sweep task), and call
/// `shutdown` when the process stops.
pub struct GenerationService {
    coordinator: FallbackCoordinator,
    cache: TtlCache<GenerationResult>,
    cache_ttl: Duration,
}

impl GenerationService {
    /// Builds the service from configuration, constructing adapters through
    /// the factory. Missing credentials or an invalid config fail here, fast.
    pub fn new(config: &ServiceConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let primary = build_adapter(config.primary_provider, config)?;
        let fallback = config
            .fallback_provider
            .map(|kind| build_adapter(kind, config))
            .transpose()?;
        Ok(Self::with_adapters(config, primary, fallback))
    }

    /// Builds the service around prebuilt adapters. The seam embedders and
    /// tests use to supply their own backends.
    pub fn with_adapters(
        config: &ServiceConfig,
        primary: Arc<dyn ProviderAdapter>,
        fallback: Option<Arc<dyn ProviderAdapter>>,
    ) -> Self {
        info!(
            primary = primary.id(),
            fallback = fallback.as_ref().map(|f| f.id().to_string()),
            max_retries = config.max_retries,
            "Generation service starting"
        );
        let coordinator =
            FallbackCoordinator::new(primary, fallback, RetryExecutor::from_config(config));
        let cache = TtlCache::new();
        cache.start_sweep(config.sweep_interval);
        Self {
            coordinator,
            cache,
            cache_ttl: config.cache_ttl,
        }
    }

    /// Generates one lesson-plan section. A cache hit returns immediately
    /// with no provider call; a miss runs the full retry/fallback pipeline
    /// and memoizes the result on success only, so a transient outage is
    /// never frozen into the cache.
    pub async fn generate_section(
        &self,
        request: &GenerationRequest,
        deadline: Option<Duration>,
    ) -> Result<GenerationResult, GenerationError> {
        let key = self.request_key(request);
        if let Some(cached) = self.cache.get(&key) {
            debug!(key, provider = cached.provider_id, "Section cache hit");
            return Ok(cached);
        }

        let (system_prompt, user_prompt) = build_prompts(request);
        let deadline = deadline.map(|remaining| Instant::now() + remaining);
        let result = self
            .coordinator
            .generate(&user_prompt, &system_prompt, deadline)
            .await?;

        self.cache.set(key, result.clone(), self.cache_ttl);
        Ok(result)
    }

    /// Best-effort liveness of the configured providers.
    pub async fn check_availability(&self) -> Availability {
        let (primary, fallback) = self.coordinator.check_availability().await;
        Availability { primary, fallback }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stops the cache sweep. Idempotent; safe to call more than once at
    /// shutdown.
    pub fn shutdown(&self) {
        self.cache.stop_sweep();
    }

    fn request_key(&self, request: &GenerationRequest) -> String {
        let snippets = request.reference_snippets().join("|");
        cache_key(
            SECTION_KEY_PREFIX,
            &[
                self.coordinator.primary_id(),
                request.theme(),
                request.target_version(),
                request.section_kind().as_str(),
                &snippets,
            ],
        )
    }
}

/// Assembles the prompt pair from the request's fields. Wording rules and
/// templating live with the caller; this is only the minimal glue the
/// adapters need.
fn build_prompts(request: &GenerationRequest) -> (String, String) {
    let system_prompt = format!(
        "You are an Unreal Engine {} expert writing lesson-plan content. \
         Be clear, step by step, and practical.",
        request.target_version()
    );

    let mut user_prompt = format!(
        "Theme: {}\nTarget version: UE{}\n\n",
        request.theme(),
        request.target_version()
    );
    if !request.reference_snippets().is_empty() {
        user_prompt.push_str(&format!(
            "Reference material:\n{}\n\n",
            request.reference_snippets().join("\n")
        ));
    }
    user_prompt.push_str(&format!(
        "Write the {} section of the lesson plan.",
        request.section_kind().as_str().replace('_', " ")
    ));

    (system_prompt, user_prompt)
}
