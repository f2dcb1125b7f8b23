//! Google Gemini backend built on rig-core

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::gemini;

use super::{CompletionOptions, LanguageModel, ProviderError};

/// Gemini generateContent backend
#[derive(Clone)]
pub struct GeminiModel {
    client: gemini::Client,
    model: String,
}

impl GeminiModel {
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        let client = gemini::Client::builder(api_key).build().map_err(|e| {
            ProviderError::NotConfigured(format!("Failed to create Gemini client: {}", e))
        })?;

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let model = options.model.as_deref().unwrap_or(&self.model);

        let mut builder = self
            .client
            .agent(model)
            .temperature(options.temperature)
            .max_tokens(options.max_tokens);
        if let Some(system) = system {
            builder = builder.preamble(system);
        }
        let agent = builder.build();

        let start_time = std::time::Instant::now();
        let response = agent.prompt(user).await.map_err(|e| {
            tracing::warn!(
                model = %model,
                elapsed_ms = start_time.elapsed().as_millis(),
                error = %e,
                "Gemini API call failed"
            );
            ProviderError::Request(e.to_string())
        })?;

        if response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(response)
    }
}
