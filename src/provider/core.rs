use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The lesson-plan section a generation request is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    LearningObjectives,
    Prerequisites,
    FeaturesUsed,
    ImplementationSteps,
    BlueprintImplementation,
    Settings,
    Diagrams,
    Troubleshooting,
    AdvancedChallenges,
    References,
}

impl SectionKind {
    /// Stable snake_case name, used for cache keys and prompt labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::LearningObjectives => "learning_objectives",
            SectionKind::Prerequisites => "prerequisites",
            SectionKind::FeaturesUsed => "features_used",
            SectionKind::ImplementationSteps => "implementation_steps",
            SectionKind::BlueprintImplementation => "blueprint_implementation",
            SectionKind::Settings => "settings",
            SectionKind::Diagrams => "diagrams",
            SectionKind::Troubleshooting => "troubleshooting",
            SectionKind::AdvancedChallenges => "advanced_challenges",
            SectionKind::References => "references",
        }
    }
}

/// One request for generated section content. Immutable once built; the
/// orchestrator reads it, it never writes back.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationRequest {
    theme: String,
    target_version: String,
    section_kind: SectionKind,
    reference_snippets: Vec<String>,
}

impl GenerationRequest {
    pub fn new(
        theme: impl Into<String>,
        target_version: impl Into<String>,
        section_kind: SectionKind,
        reference_snippets: Vec<String>,
    ) -> Self {
        Self {
            theme: theme.into(),
            target_version: target_version.into(),
            section_kind,
            reference_snippets,
        }
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn target_version(&self) -> &str {
        &self.target_version
    }

    pub fn section_kind(&self) -> SectionKind {
        self.section_kind
    }

    pub fn reference_snippets(&self) -> &[String] {
        &self.reference_snippets
    }
}

/// A completed generation. `provider_id` always names the adapter that
/// actually produced `content`, so a fallback success reports the fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationResult {
    pub content: String,
    pub provider_id: String,
    pub tokens_used: Option<u32>,
}

/// Adapter-level failure. Every variant carries the id of the provider that
/// failed so the retry and fallback layers can report root cause.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },
    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("{provider} returned empty response")]
    EmptyResponse { provider: String },
    #[error("{provider} returned non-text response")]
    NonText { provider: String },
    #[error("{provider} request timed out after {timeout_ms}ms")]
    Timeout { provider: String, timeout_ms: u64 },
}

impl ProviderError {
    /// Id of the provider the error originated from.
    pub fn provider(&self) -> &str {
        match self {
            ProviderError::Request { provider, .. }
            | ProviderError::Status { provider, .. }
            | ProviderError::EmptyResponse { provider }
            | ProviderError::NonText { provider }
            | ProviderError::Timeout { provider, .. } => provider,
        }
    }
}

/// The generation-capability contract every backend implements.
///
/// Implementations hold no mutable state between calls; one `generate` is one
/// network round trip. The orchestration layers above are blind to which
/// backend sits behind the trait.
#[async_trait]
pub trait ProviderAdapter: Send + Sync + std::fmt::Debug {
    /// Stable identifier reported in results and errors.
    fn id(&self) -> &str;

    /// Sends the prompt pair to the backend and returns the generated text.
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
    ) -> Result<GenerationResult, ProviderError>;

    /// Best-effort liveness probe. Must not error; a failed probe is `false`.
    async fn is_available(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_kind_names_are_stable() {
        assert_eq!(SectionKind::LearningObjectives.as_str(), "learning_objectives");
        assert_eq!(SectionKind::BlueprintImplementation.as_str(), "blueprint_implementation");
        assert_eq!(
            serde_json::to_string(&SectionKind::FeaturesUsed).unwrap(),
            "\"features_used\""
        );
    }

    #[test]
    fn provider_error_exposes_origin() {
        let err = ProviderError::EmptyResponse {
            provider: "openai".to_string(),
        };
        assert_eq!(err.provider(), "openai");
        assert_eq!(err.to_string(), "openai returned empty response");
    }

    #[test]
    fn request_accessors_round_trip() {
        let req = GenerationRequest::new(
            "Third person camera",
            "5.6",
            SectionKind::ImplementationSteps,
            vec!["snippet".to_string()],
        );
        assert_eq!(req.theme(), "Third person camera");
        assert_eq!(req.target_version(), "5.6");
        assert_eq!(req.section_kind(), SectionKind::ImplementationSteps);
        assert_eq!(req.reference_snippets().len(), 1);
    }
}
