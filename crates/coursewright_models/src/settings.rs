//! Provider endpoints and model names.

use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// The `[models]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Base URL of the OpenAI-compatible completion API
    #[serde(default = "default_api_base_url")]
    api_base_url: String,
    /// Model for plain completion
    #[serde(default = "default_completion_model")]
    completion_model: String,
    /// Model for retrieval-scoped completion
    #[serde(default = "default_completion_model")]
    rag_model: String,
    /// Base URL of the research API
    #[serde(default = "default_research_base_url")]
    research_base_url: String,
    /// Model for search-augmented research
    #[serde(default = "default_research_model")]
    research_model: String,
    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

fn default_api_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_research_base_url() -> String {
    "https://api.perplexity.ai".to_string()
}

fn default_research_model() -> String {
    "sonar".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            completion_model: default_completion_model(),
            rag_model: default_completion_model(),
            research_base_url: default_research_base_url(),
            research_model: default_research_model(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
