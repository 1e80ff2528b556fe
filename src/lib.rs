//! # LessonForge: resilient AI-provider orchestration for lesson-plan generation.
//!
//! A primary provider is called with bounded exponential-backoff retries and
//! a secondary provider takes over once the primary is exhausted, all behind
//! a TTL cache so identical requests never pay for a second generation.

/// The `cache` module provides a generic TTL key-value store with a
/// background sweep.
pub mod cache;
/// The `config` module loads the immutable process-wide configuration.
pub mod config;
/// The `fallback` module coordinates primary and fallback provider runs.
pub mod fallback;
/// The `provider` module defines the generation contract and the backend
/// adapters.
pub mod provider;
/// The `retry` module executes one adapter call with bounded retries.
pub mod retry;
/// The `service` module is the public entry point combining cache, retry,
/// and fallback.
pub mod service;

pub use cache::{CacheStats, TtlCache};
pub use config::{ConfigError, ProviderKind, ServiceConfig};
pub use fallback::{FallbackCoordinator, FallbackError};
pub use provider::{
    GenerationRequest, GenerationResult, ProviderAdapter, ProviderError, SectionKind,
};
pub use retry::{RetryError, RetryExecutor};
pub use service::{Availability, GenerationError, GenerationService};
