//! OpenAI backend built on rig-core

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

use super::{CompletionOptions, LanguageModel, ProviderError};

/// OpenAI chat completion backend
#[derive(Clone)]
pub struct OpenAiModel {
    client: openai::Client,
    model: String,
}

impl OpenAiModel {
    /// Create a new OpenAI backend with the provided API key
    pub fn new(api_key: &str, model: &str) -> Result<Self, ProviderError> {
        let client = openai::Client::builder(api_key).build().map_err(|e| {
            ProviderError::NotConfigured(format!("Failed to create OpenAI client: {}", e))
        })?;

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        "openai"
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
            tracing::error!(
                model = %model,
                elapsed_ms = start_time.elapsed().as_millis(),
                error = %e,
                "OpenAI API call failed"
            );
            ProviderError::Request(e.to_string())
        })?;

        tracing::debug!(
            model = %model,
            elapsed_ms = start_time.elapsed().as_millis(),
            prompt_length = user.len(),
            response_length = response.len(),
            "OpenAI API call completed"
        );

        if response.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(response)
    }
}
