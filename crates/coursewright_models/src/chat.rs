//! Plain completion over an OpenAI-compatible chat endpoint.

use crate::dto::{ChatMessage, ChatRequest, ChatResponse};
use crate::http::{check_status, endpoint, transport_error};
use async_trait::async_trait;
use coursewright_core::{Completion, CompletionRequest};
use coursewright_error::{ModelError, ModelErrorKind};
use coursewright_interface::CompletionDriver;
use reqwest::Client;
use tracing::{debug, error, instrument};

/// Chat completion client.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl ChatCompletionClient {
    /// Creates a new client against `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(client: Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        debug!("Creating chat completion client");
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    fn convert_request(request: &CompletionRequest) -> Result<ChatRequest, ModelError> {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt().is_empty() {
            messages.push(ChatMessage::system(request.system_prompt().clone()));
        }
        messages.push(ChatMessage::user(request.user_prompt().clone()));

        ChatRequest::builder()
            .model(request.model().clone())
            .messages(messages)
            .max_tokens(*request.max_tokens())
            .temperature(*request.temperature())
            .build()
            .map_err(|e| ModelError::new(ModelErrorKind::InvalidRequest(e.to_string())))
    }
}

#[async_trait]
impl CompletionDriver for ChatCompletionClient {
    #[instrument(skip(self, request), fields(model = %request.model()))]
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, ModelError> {
        let body = Self::convert_request(request)?;

        let response = self
            .client
            .post(endpoint(&self.base_url, "chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            error!(error = ?e, "Failed to parse chat response");
            ModelError::new(ModelErrorKind::InvalidResponse(e.to_string()))
        })?;

        let text = parsed
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ModelError::new(ModelErrorKind::EmptyCompletion))?
            .to_string();

        debug!(chars = text.len(), "Received completion");
        Ok(Completion::new(text, parsed.token_usage()))
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
