//! Wire types for the OpenAI-compatible endpoints.

use coursewright_core::{Citation, TokenUsage};
use serde::{Deserialize, Serialize};

/// Chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// `/chat/completions` request body.
#[derive(Debug, Clone, Serialize, derive_builder::Builder)]
#[builder(setter(into))]
pub(crate) struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl ChatRequest {
    pub fn builder() -> ChatRequestBuilder {
        ChatRequestBuilder::default()
    }
}

/// Usage block of a chat response.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl From<ChatUsage> for TokenUsage {
    fn from(u: ChatUsage) -> Self {
        TokenUsage::with_total(u.prompt_tokens, u.completion_tokens, u.total_tokens)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatChoice {
    message: ChatChoiceMessage,
}

/// Search result entry some research providers return instead of bare URLs.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SearchResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
}

/// `/chat/completions` response body, including research extensions.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    search_results: Vec<SearchResult>,
}

impl ChatResponse {
    /// Text of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }

    /// Reported usage; missing usage is `None` and counts as zero upstream.
    pub fn token_usage(&self) -> Option<TokenUsage> {
        self.usage.map(TokenUsage::from)
    }

    /// Citations, preferring titled search results over bare URLs.
    pub fn citation_list(&self) -> Vec<Citation> {
        if !self.search_results.is_empty() {
            return self
                .search_results
                .iter()
                .map(|r| Citation::new(r.url.clone(), r.title.clone()))
                .collect();
        }
        self.citations
            .iter()
            .map(|url| Citation::new(url.clone(), None))
            .collect()
    }
}

/// `file_search` tool declaration.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct FileSearchTool {
    #[serde(rename = "type")]
    kind: &'static str,
    vector_store_ids: Vec<String>,
}

impl FileSearchTool {
    pub fn new(vector_store_ids: Vec<String>) -> Self {
        Self {
            kind: "file_search",
            vector_store_ids,
        }
    }
}

/// `/responses` request body.
#[derive(Debug, Clone, Serialize, derive_builder::Builder)]
#[builder(setter(into))]
pub(crate) struct ResponsesRequest {
    model: String,
    input: String,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    tools: Vec<FileSearchTool>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl ResponsesRequest {
    pub fn builder() -> ResponsesRequestBuilder {
        ResponsesRequestBuilder::default()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct ResponsesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// `/responses` response body.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
    #[serde(default)]
    usage: Option<ResponsesUsage>,
}

impl ResponsesResponse {
    /// Concatenated `output_text` parts of every message item.
    pub fn text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|c| c.kind == "output_text")
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn token_usage(&self) -> Option<TokenUsage> {
        self.usage
            .map(|u| TokenUsage::with_total(u.input_tokens, u.output_tokens, u.total_tokens))
    }
}
