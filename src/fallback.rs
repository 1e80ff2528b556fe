// Drives the retry executor against the primary adapter, then the fallback
// adapter once the primary is confirmed exhausted.

use crate::provider::{GenerationResult, ProviderAdapter};
use crate::retry::{RetryError, RetryExecutor};
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

#[derive(Error, Debug)]
pub enum FallbackError {
    /// No fallback was configured (or the deadline elapsed); the underlying
    /// retry error propagates unchanged.
    #[error(transparent)]
    Retry(#[from] RetryError),
    /// Primary and fallback both exhausted their attempts. Carries both
    /// underlying messages, primary first, so operators see both causes.
    #[error("all providers exhausted; primary: {primary}; fallback: {fallback}")]
    AllProvidersExhausted { primary: String, fallback: String },
}

/// Sequential primary-then-fallback orchestration. The fallback run only
/// starts after the primary has spent its full retry budget; the two runs are
/// never concurrent and use the same retry policy independently.
pub struct FallbackCoordinator {
    primary: Arc<dyn ProviderAdapter>,
    fallback: Option<Arc<dyn ProviderAdapter>>,
    executor: RetryExecutor,
}

impl FallbackCoordinator {
    pub fn new(
        primary: Arc<dyn ProviderAdapter>,
        fallback: Option<Arc<dyn ProviderAdapter>>,
        executor: RetryExecutor,
    ) -> Self {
        Self {
            primary,
            fallback,
            executor,
        }
    }

    /// Id of the primary adapter, used for cache key construction.
    pub fn primary_id(&self) -> &str {
        self.primary.id()
    }

    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        deadline: Option<Instant>,
    ) -> Result<GenerationResult, FallbackError> {
        let primary_err = match self
            .executor
            .run(self.primary.as_ref(), prompt, system_prompt, deadline)
            .await
        {
            Ok(result) => return Ok(result),
            // A spent deadline never justifies another provider run.
            Err(err @ RetryError::DeadlineExceeded) => return Err(err.into()),
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            return Err(primary_err.into());
        };

        warn!(
            primary = self.primary.id(),
            fallback = fallback.id(),
            "Primary provider exhausted, trying fallback"
        );
        match self
            .executor
            .run(fallback.as_ref(), prompt, system_prompt, deadline)
            .await
        {
            Ok(result) => Ok(result),
            Err(err @ RetryError::DeadlineExceeded) => Err(err.into()),
            Err(fallback_err) => Err(FallbackError::AllProvidersExhausted {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        }
    }

    /// Probes both adapters. Never errors; a failed probe reads as `false`.
    pub async fn check_availability(&self) -> (bool, Option<bool>) {
        let primary = self.primary.is_available().await;
        let fallback = match &self.fallback {
            Some(adapter) => Some(adapter.is_available().await),
            None => None,
        };
        (primary, fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct MockAdapter {
        id: &'static str,
        call_count: Arc<AtomicUsize>,
        healthy: bool,
    }

    impl MockAdapter {
        fn new(id: &'static str, healthy: bool) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let adapter = Arc::new(Self {
                id,
                call_count: calls.clone(),
                healthy,
            });
            (adapter, calls)
        }
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn id(&self) -> &str {
            self.id
        }

        async fn generate(
            &self,
            _prompt: &str,
            _system_prompt: &str,
        ) -> Result<GenerationResult, ProviderError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                Ok(GenerationResult {
                    content: format!("content from {}", self.id),
                    provider_id: self.id.to_string(),
                    tokens_used: None,
                })
            } else {
                Err(ProviderError::Request {
                    provider: self.id.to_string(),
                    message: format!("{} is down", self.id),
                })
            }
        }

        async fn is_available(&self) -> bool {
            self.healthy
        }
    }

    fn executor() -> RetryExecutor {
        RetryExecutor::new(2, Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn primary_success_never_touches_fallback() {
        let (primary, primary_calls) = MockAdapter::new("primary", true);
        let (fallback, fallback_calls) = MockAdapter::new("fallback", true);
        let coordinator = FallbackCoordinator::new(primary, Some(fallback), executor());

        let result = coordinator.generate("p", "s", None).await.unwrap();

        assert_eq!(result.provider_id, "primary");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fallback_success_reports_fallback_id() {
        let (primary, primary_calls) = MockAdapter::new("primary", false);
        let (fallback, fallback_calls) = MockAdapter::new("fallback", true);
        let coordinator = FallbackCoordinator::new(primary, Some(fallback), executor());

        let result = coordinator.generate("p", "s", None).await.unwrap();

        assert_eq!(result.provider_id, "fallback");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn both_exhausted_embeds_both_messages() {
        let (primary, _) = MockAdapter::new("primary", false);
        let (fallback, _) = MockAdapter::new("fallback", false);
        let coordinator = FallbackCoordinator::new(primary, Some(fallback), executor());

        let err = coordinator.generate("p", "s", None).await.unwrap_err();

        match err {
            FallbackError::AllProvidersExhausted { primary, fallback } => {
                assert!(primary.contains("primary is down"));
                assert!(fallback.contains("fallback is down"));
                assert_ne!(primary, fallback);
            }
            other => panic!("expected AllProvidersExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn without_fallback_the_retry_error_propagates_unchanged() {
        let (primary, primary_calls) = MockAdapter::new("primary", false);
        let coordinator = FallbackCoordinator::new(primary, None, executor());

        let err = coordinator.generate("p", "s", None).await.unwrap_err();

        assert!(matches!(
            err,
            FallbackError::Retry(RetryError::Exhausted { .. })
        ));
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_exceeded_skips_the_fallback() {
        let (primary, _) = MockAdapter::new("primary", false);
        let (fallback, fallback_calls) = MockAdapter::new("fallback", true);
        let coordinator = FallbackCoordinator::new(primary, Some(fallback), executor());

        let deadline = Instant::now();
        let err = coordinator.generate("p", "s", Some(deadline)).await.unwrap_err();

        assert!(matches!(
            err,
            FallbackError::Retry(RetryError::DeadlineExceeded)
        ));
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn availability_probes_both_adapters() {
        let (primary, _) = MockAdapter::new("primary", true);
        let (fallback, _) = MockAdapter::new("fallback", false);
        let coordinator = FallbackCoordinator::new(primary, Some(fallback), executor());

        assert_eq!(coordinator.check_availability().await, (true, Some(false)));

        let (lone, _) = MockAdapter::new("primary", true);
        let coordinator = FallbackCoordinator::new(lone, None, executor());
        assert_eq!(coordinator.check_availability().await, (true, None));
    }
}
