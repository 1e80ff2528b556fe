use crate::config::{ConfigError, ProviderKind, ServiceConfig};
use crate::provider::anthropic::AnthropicAdapter;
use crate::provider::core::ProviderAdapter;
use crate::provider::openai::OpenAiAdapter;
use std::sync::Arc;
use tracing::debug;

/// Builds the adapter for `kind` from the immutable service configuration.
///
/// Fails fast with `ConfigError::MissingApiKey` when the selected backend has
/// no credential; a misconfigured provider must never reach the retry loop.
pub fn build_adapter(
    kind: ProviderKind,
    config: &ServiceConfig,
) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
    debug!(provider = kind.as_str(), "Building provider adapter");
    match kind {
        ProviderKind::OpenAi => {
            let api_key = config
                .openai_api_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingApiKey {
                    provider: kind.as_str().to_string(),
                })?;
            Ok(Arc::new(OpenAiAdapter::new(
                api_key,
                config.temperature,
                config.max_tokens,
                config.request_timeout,
            )))
        }
        ProviderKind::Anthropic => {
            let api_key = config
                .anthropic_api_key
                .as_deref()
                .ok_or_else(|| ConfigError::MissingApiKey {
                    provider: kind.as_str().to_string(),
                })?;
            Ok(Arc::new(AnthropicAdapter::new(
                api_key,
                config.temperature,
                config.max_tokens,
                config.request_timeout,
            )))
        }
    }
}
