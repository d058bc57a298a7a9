//! Request and response types for text completion.

use crate::TokenUsage;
use coursewright_error::BuilderError;
use derive_getters::Getters;
use serde::{Deserialize, Serialize};

/// A single completion request.
///
/// # Examples
///
/// ```
/// use coursewright_core::CompletionRequest;
///
/// let request = CompletionRequest::builder()
///     .model("gpt-4o-mini")
///     .system_prompt("You are a course author.")
///     .user_prompt("Write an introduction to ownership.")
///     .max_tokens(Some(800))
///     .build()
///     .unwrap();
/// assert_eq!(request.model(), "gpt-4o-mini");
/// ```
#[derive(
    Debug, Clone, PartialEq, Getters, Serialize, Deserialize, derive_builder::Builder,
)]
#[builder(setter(into), build_fn(error = "BuilderError"))]
pub struct CompletionRequest {
    /// Model identifier
    model: String,
    /// System prompt
    #[builder(default)]
    system_prompt: String,
    /// User prompt
    user_prompt: String,
    /// Maximum number of tokens to generate
    #[builder(default)]
    #[serde(default)]
    max_tokens: Option<u32>,
    /// Sampling temperature
    #[builder(default)]
    #[serde(default)]
    temperature: Option<f32>,
}

impl CompletionRequest {
    /// Creates a new request builder.
    pub fn builder() -> CompletionRequestBuilder {
        CompletionRequestBuilder::default()
    }

    /// A copy of this request with a different user prompt.
    pub fn with_user_prompt(&self, user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            ..self.clone()
        }
    }
}

/// Text returned by a completion provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    text: String,
    /// Usage reported by the provider; zero when the response carried none
    usage: TokenUsage,
}

impl Completion {
    /// Create a completion. `None` usage is counted as zero.
    pub fn new(text: impl Into<String>, usage: Option<TokenUsage>) -> Self {
        Self {
            text: text.into(),
            usage: usage.unwrap_or_default(),
        }
    }

    /// Consume the completion, returning its text.
    pub fn into_text(self) -> String {
        self.text
    }
}

/// A source cited by a research provider.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct Citation {
    /// Source URL
    url: String,
    /// Page title, when the provider reports one
    #[serde(default)]
    title: Option<String>,
}

impl Citation {
    /// Create a citation.
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
        }
    }
}

/// Result of a search-augmented completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Getters, Serialize, Deserialize)]
pub struct ResearchResult {
    /// Synthesized text
    text: String,
    /// Sources backing the text
    citations: Vec<Citation>,
    /// Usage reported by the provider
    usage: TokenUsage,
}

impl ResearchResult {
    /// Create a research result. `None` usage is counted as zero.
    pub fn new(text: impl Into<String>, citations: Vec<Citation>, usage: Option<TokenUsage>) -> Self {
        Self {
            text: text.into(),
            citations,
            usage: usage.unwrap_or_default(),
        }
    }

    /// Text followed by a numbered source list, ready to drop into a prompt.
    pub fn as_context(&self) -> String {
        if self.citations.is_empty() {
            return self.text.clone();
        }
        let sources = self
            .citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}", i + 1, c.url))
            .collect::<Vec<_>>()
            .join("\n");
        format!("{}\n\nSources:\n{}", self.text, sources)
    }
}
