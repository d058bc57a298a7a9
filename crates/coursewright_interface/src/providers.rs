//! Model provider capabilities.

use async_trait::async_trait;
use coursewright_core::{Completion, CompletionRequest, ResearchResult};
use coursewright_error::ModelError;
use std::sync::Arc;

/// Plain text completion.
#[async_trait]
pub trait CompletionDriver: Send + Sync {
    /// Complete a single request.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError>;

    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &'static str;
}

/// Completion scoped to one or more knowledge libraries.
#[async_trait]
pub trait RagDriver: Send + Sync {
    /// Complete a request with retrieval over `library_ids`.
    async fn complete_with_libraries(
        &self,
        library_ids: &[String],
        request: &CompletionRequest,
    ) -> Result<Completion, ModelError>;

    /// Provider name.
    fn provider_name(&self) -> &'static str;
}

/// Search-augmented completion that cites its sources.
#[async_trait]
pub trait WebResearch: Send + Sync {
    /// Research `query` against the live web.
    async fn research(&self, query: &str) -> Result<ResearchResult, ModelError>;

    /// Model identifier used for research.
    fn model_name(&self) -> &str;
}

/// Builds provider drivers from the API keys supplied with a run.
pub trait ProviderFactory: Send + Sync {
    /// Completion driver for the LLM key. Fails for an unusable key.
    fn completion(&self, api_key: &str) -> Result<Arc<dyn CompletionDriver>, ModelError>;

    /// Retrieval driver for the LLM key, if the provider supports retrieval.
    fn rag(&self, api_key: &str) -> Option<Arc<dyn RagDriver>>;

    /// Research driver for the research key, if one can be built.
    fn research(&self, api_key: &str) -> Option<Arc<dyn WebResearch>>;
}
