//! Search-augmented research.

use crate::dto::{ChatMessage, ChatRequest, ChatResponse};
use crate::http::{check_status, endpoint, transport_error};
use async_trait::async_trait;
use coursewright_core::ResearchResult;
use coursewright_error::{ModelError, ModelErrorKind};
use coursewright_interface::WebResearch;
use reqwest::Client;
use tracing::{debug, error, instrument};

const RESEARCH_SYSTEM_PROMPT: &str = "You are a research assistant. Summarize current, \
verifiable information relevant to the query for a course author. Be concise and factual.";

/// Research client for an OpenAI-compatible endpoint that returns citations.
#[derive(Debug, Clone)]
pub struct ResearchClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl ResearchClient {
    /// Creates a new research client.
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl WebResearch for ResearchClient {
    #[instrument(skip(self, query), fields(model = %self.model))]
    async fn research(&self, query: &str) -> Result<ResearchResult, ModelError> {
        let body = ChatRequest::builder()
            .model(self.model.clone())
            .messages(vec![
                ChatMessage::system(RESEARCH_SYSTEM_PROMPT),
                ChatMessage::user(query),
            ])
            .build()
            .map_err(|e| ModelError::new(ModelErrorKind::InvalidRequest(e.to_string())))?;

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
            error!(error = ?e, "Failed to parse research response");
            ModelError::new(ModelErrorKind::InvalidResponse(e.to_string()))
        })?;

        let text = parsed.text().unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(ModelError::new(ModelErrorKind::EmptyCompletion));
        }
        let citations = parsed.citation_list();
        debug!(citations = citations.len(), "Received research");
        Ok(ResearchResult::new(text, citations, parsed.token_usage()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
