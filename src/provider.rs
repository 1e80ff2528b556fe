// The `provider` module defines the generation-capability contract and the
// backend adapters that implement it.

pub mod anthropic;
pub mod core;
pub mod factory;
pub mod http;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use factory::build_adapter;
pub use openai::OpenAiAdapter;
pub use self::core::{
    GenerationRequest, GenerationResult, ProviderAdapter, ProviderError, SectionKind,
};
