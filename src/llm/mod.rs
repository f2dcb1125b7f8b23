//! Language model capability and its concrete backends
//!
//! Every backend reduces to one operation: complete a user prompt under an
//! optional system prompt. The backend is chosen once at startup from
//! configuration and injected into the services that need it.

mod anthropic;
mod gemini;
mod ollama;
mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::model::{LlmConfig, LlmProviderKind};

pub use anthropic::AnthropicModel;
pub use gemini::GeminiModel;
pub use ollama::OllamaModel;
pub use openai::OpenAiModel;

/// Output budget used by default for a completion
pub const DEFAULT_MAX_TOKENS: u64 = 2048;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProviderError {
    #[error("LLM provider not configured: {0}")]
    NotConfigured(String),

    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("LLM API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("LLM returned an empty response")]
    EmptyResponse,
}

/// Per-call completion options
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOptions {
    pub max_tokens: u64,
    pub temperature: f64,
    /// Overrides the backend's configured model
    pub model: Option<String>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
            model: None,
        }
    }
}

impl CompletionOptions {
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Free-text completion capability
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &str;

    /// Complete `user` under the optional `system` instructions
    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;
}

/// Build the configured language model backend
pub fn build_language_model(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>, ProviderError> {
    let model_name = config.model_name();

    let model: Arc<dyn LanguageModel> = match config.provider {
        LlmProviderKind::OpenAi => Arc::new(OpenAiModel::new(require_key(config, "OpenAI")?, model_name)?),
        LlmProviderKind::Anthropic => Arc::new(AnthropicModel::new(
            require_key(config, "Anthropic")?,
            model_name,
        )?),
        LlmProviderKind::Gemini => Arc::new(GeminiModel::new(require_key(config, "Gemini")?, model_name)?),
        LlmProviderKind::Ollama => Arc::new(OllamaModel::new(&config.ollama_url, model_name)),
    };

    tracing::info!(provider = model.name(), model = %model_name, "Language model initialized");

    Ok(model)
}

fn require_key<'a>(config: &'a LlmConfig, provider: &str) -> Result<&'a str, ProviderError> {
    config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ProviderError::NotConfigured(format!("missing {} API key", provider)))
}
