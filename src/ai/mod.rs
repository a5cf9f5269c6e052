//! AI Integration Layer
//!
//! Provider backends, routing with fallback, prompts, research and the
//! cancellation and timeout primitives the generation pipeline relies on.

pub mod cancel;
pub mod prompt;
pub mod provider;
pub mod research;
pub mod router;
pub mod timeout;
pub mod validation;

pub use cancel::CancellationToken;
pub use prompt::{PromptBuilder, PromptSection, PromptTemplates};
pub use provider::{
    BedrockProvider, CapabilityProbe, CliCapabilityProbe, CompletionBackend, ImageRequest,
    LocalCapabilities, LocalCliProvider, LocalTool, OpenAiProvider, OperationKind,
    OutlineRequest, ProviderAdapter, ProviderKind, RetryPolicy, SharedBackend,
};
pub use research::{PerplexityResearch, ResearchClient, enrich_description};
pub use router::{
    AdapterFactory, HttpAdapterFactory, ProviderRequest, ProviderResponse, Routed, ServiceRouter,
};
pub use timeout::{TimeoutConfig, with_timeout, with_timeout_map};
pub use validation::{ExtractError, JsonShape, extract_json};
