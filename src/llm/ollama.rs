//! Ollama backend using the local chat API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionOptions, LanguageModel, ProviderError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Locally hosted model served by Ollama
pub struct OllamaModel {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u64,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaModel {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    fn build_request<'a>(
        &'a self,
        system: Option<&'a str>,
        user: &'a str,
        options: &'a CompletionOptions,
    ) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages,
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                num_predict: options.max_tokens,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = self.build_request(system, user, options);

        tracing::debug!(url = %url, model = request.model, "Sending Ollama chat request");

        let response = self.client.post(&url).json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        if body.message.content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(body.message.content)
    }
}
