//! Retrieval-scoped completion using the `file_search` tool.

use crate::dto::{FileSearchTool, ResponsesRequest, ResponsesResponse};
use crate::http::{check_status, endpoint, transport_error};
use async_trait::async_trait;
use coursewright_core::{Completion, CompletionRequest};
use coursewright_error::{ModelError, ModelErrorKind};
use coursewright_interface::RagDriver;
use reqwest::Client;
use tracing::{debug, error, instrument};

/// Completion grounded in one or more vector stores.
#[derive(Debug, Clone)]
pub struct FileSearchClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl FileSearchClient {
    /// Creates a new client. `model` overrides the request's model.
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
impl RagDriver for FileSearchClient {
    #[instrument(skip(self, request), fields(model = %self.model, libraries = library_ids.len()))]
    async fn complete_with_libraries(
        &self,
        library_ids: &[String],
        request: &CompletionRequest,
    ) -> Result<Completion, ModelError> {
        if library_ids.is_empty() {
            return Err(ModelError::new(ModelErrorKind::InvalidRequest(
                "file search needs at least one library".to_string(),
            )));
        }

        let instructions = Some(request.system_prompt().clone()).filter(|s| !s.is_empty());
        let body = ResponsesRequest::builder()
            .model(self.model.clone())
            .input(request.user_prompt().clone())
            .instructions(instructions)
            .tools(vec![FileSearchTool::new(library_ids.to_vec())])
            .max_output_tokens(*request.max_tokens())
            .temperature(*request.temperature())
            .build()
            .map_err(|e| ModelError::new(ModelErrorKind::InvalidRequest(e.to_string())))?;

        let response = self
            .client
            .post(endpoint(&self.base_url, "responses"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response).await?;

        let parsed: ResponsesResponse = response.json().await.map_err(|e| {
            error!(error = ?e, "Failed to parse file search response");
            ModelError::new(ModelErrorKind::InvalidResponse(e.to_string()))
        })?;

        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(ModelError::new(ModelErrorKind::EmptyCompletion));
        }
        debug!(chars = text.len(), "Received retrieval completion");
        Ok(Completion::new(text, parsed.token_usage()))
    }

    fn provider_name(&self) -> &'static str {
        "openai-file-search"
    }
}
