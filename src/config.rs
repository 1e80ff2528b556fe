// Process-wide configuration, loaded once from the environment at startup.
// Components receive `&ServiceConfig` at construction and never mutate it.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 3000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Base delay of the exponential backoff; attempt `k` waits `2^k` times this.
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(1000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Construction-time failure. Never retried; the process should surface it
/// and exit.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{provider} API key is not configured")]
    MissingApiKey { provider: String },
    #[error("unknown AI provider: {0}")]
    UnknownProvider(String),
    #[error("at least one AI API key (OpenAI or Anthropic) must be configured")]
    NoProviderConfigured,
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
}

/// The backends this crate knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "claude",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "claude" | "anthropic" => Ok(ProviderKind::Anthropic),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// Immutable service configuration. Built once from the environment (or by
/// hand in tests) and passed by reference into every component constructor.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub primary_provider: ProviderKind,
    pub fallback_provider: Option<ProviderKind>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub request_timeout: Duration,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
}

impl ServiceConfig {
    /// Loads configuration from the environment, reading a `.env` file if one
    /// is present. Provider selection follows key availability: with both
    /// keys OpenAI is primary and Claude the fallback, with one key that
    /// provider runs alone, with neither this fails fast.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let openai_api_key = non_empty_var("OPENAI_API_KEY");
        let anthropic_api_key = non_empty_var("ANTHROPIC_API_KEY");

        let (primary_provider, fallback_provider) =
            match (openai_api_key.is_some(), anthropic_api_key.is_some()) {
                (true, true) => (ProviderKind::OpenAi, Some(ProviderKind::Anthropic)),
                (true, false) => (ProviderKind::OpenAi, None),
                (false, true) => (ProviderKind::Anthropic, None),
                (false, false) => return Err(ConfigError::NoProviderConfigured),
            };

        // Explicit selection overrides the key-driven default.
        let primary_provider = match non_empty_var("AI_PRIMARY_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => primary_provider,
        };
        let fallback_provider = match non_empty_var("AI_FALLBACK_PROVIDER") {
            Some(raw) => Some(raw.parse()?),
            None => fallback_provider,
        };

        let config = Self {
            primary_provider,
            fallback_provider,
            openai_api_key,
            anthropic_api_key,
            temperature: parsed_var("AI_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_tokens: parsed_var("AI_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            max_retries: parsed_var("AI_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            base_backoff: duration_var("AI_BASE_BACKOFF", DEFAULT_BASE_BACKOFF)?,
            request_timeout: duration_var("AI_REQUEST_TIMEOUT", DEFAULT_REQUEST_TIMEOUT)?,
            cache_ttl: duration_var("CACHE_TTL", DEFAULT_CACHE_TTL)?,
            sweep_interval: duration_var("CACHE_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL)?,
        };

        config.validate()?;
        debug!(
            primary = config.primary_provider.as_str(),
            fallback = config.fallback_provider.map(|p| p.as_str()),
            max_retries = config.max_retries,
            "Loaded service configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                name: "AI_MAX_RETRIES".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                name: "AI_TEMPERATURE".to_string(),
                message: "must be between 0.0 and 2.0".to_string(),
            });
        }
        if self.request_timeout < MIN_REQUEST_TIMEOUT || self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(ConfigError::InvalidValue {
                name: "AI_REQUEST_TIMEOUT".to_string(),
                message: "must be between 1s and 600s".to_string(),
            });
        }
        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match non_empty_var(name) {
        Some(raw) => raw.parse().map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("{e}"),
        }),
        None => Ok(default),
    }
}

/// Duration-valued variables accept humantime strings like `2s` or `1h`.
fn duration_var(name: &str, default: Duration) -> Result<Duration, ConfigError> {
    match non_empty_var(name) {
        Some(raw) => humantime::parse_duration(&raw).map_err(|e| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("{e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServiceConfig {
        ServiceConfig {
            primary_provider: ProviderKind::OpenAi,
            fallback_provider: Some(ProviderKind::Anthropic),
            openai_api_key: Some("sk-test".to_string()),
            anthropic_api_key: Some("sk-ant-test".to_string()),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            max_retries: DEFAULT_MAX_RETRIES,
            base_backoff: DEFAULT_BASE_BACKOFF,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    #[test]
    fn provider_kind_parses_known_ids() {
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("claude".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert_eq!("Anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!(matches!(
            "gemini".parse::<ProviderKind>(),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn valid_config_passes_validation() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn zero_retries_is_rejected() {
        let mut config = base_config();
        config.max_retries = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn out_of_range_timeout_is_rejected() {
        let mut config = base_config();
        config.request_timeout = Duration::from_millis(100);
        assert!(config.validate().is_err());

        config.request_timeout = Duration::from_secs(601);
        assert!(config.validate().is_err());
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let mut config = base_config();
        config.temperature = 2.5;
        assert!(config.validate().is_err());
    }
}
