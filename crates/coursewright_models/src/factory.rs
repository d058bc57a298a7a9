//! Builds HTTP providers from settings and per-run keys.

use crate::http::build_client;
use crate::{ChatCompletionClient, FileSearchClient, ModelSettings, ResearchClient};
use coursewright_error::{ModelError, ModelErrorKind};
use coursewright_interface::{CompletionDriver, ProviderFactory, RagDriver, WebResearch};
use reqwest::Client;
use std::sync::Arc;
use tracing::warn;

/// Provider factory for the HTTP clients in this crate.
///
/// All drivers share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    settings: ModelSettings,
    client: Client,
}

impl HttpProviderFactory {
    /// Create a factory.
    pub fn new(settings: ModelSettings) -> Result<Self, ModelError> {
        let client = build_client(*settings.request_timeout_secs())?;
        Ok(Self { settings, client })
    }

    /// Active settings.
    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn completion(&self, api_key: &str) -> Result<Arc<dyn CompletionDriver>, ModelError> {
        if api_key.trim().is_empty() {
            return Err(ModelError::new(ModelErrorKind::MissingApiKey(
                "completion".to_string(),
            )));
        }
        Ok(Arc::new(ChatCompletionClient::new(
            self.client.clone(),
            api_key,
            self.settings.api_base_url().clone(),
        )))
    }

    fn rag(&self, api_key: &str) -> Option<Arc<dyn RagDriver>> {
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Arc::new(FileSearchClient::new(
            self.client.clone(),
            api_key,
            self.settings.api_base_url().clone(),
            self.settings.rag_model().clone(),
        )))
    }

    fn research(&self, api_key: &str) -> Option<Arc<dyn WebResearch>> {
        if api_key.trim().is_empty() {
            warn!("Web research requested without a research API key");
            return None;
        }
        Some(Arc::new(ResearchClient::new(
            self.client.clone(),
            api_key,
            self.settings.research_base_url().clone(),
            self.settings.research_model().clone(),
        )))
    }
}
