use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

const ENV_CONFIG_PATH: &str = "VERITY_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
const ENV_LLM_MODEL: &str = "LLM_MODEL";

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("{0} API key is required")]
    MissingApiKey(&'static str),

    #[error("Invalid engine setting: {0}")]
    InvalidEngine(&'static str),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Language model backend selected at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl LlmProviderKind {
    /// Display name and API key variable of providers that need a key
    fn api_key_source(self) -> Option<(&'static str, &'static str)> {
        match self {
            LlmProviderKind::OpenAi => Some(("OpenAI", ENV_OPENAI_API_KEY)),
            LlmProviderKind::Anthropic => Some(("Anthropic", ENV_ANTHROPIC_API_KEY)),
            LlmProviderKind::Gemini => Some(("Gemini", ENV_GEMINI_API_KEY)),
            LlmProviderKind::Ollama => None,
        }
    }

    fn default_model(self) -> &'static str {
        match self {
            LlmProviderKind::OpenAi => "gpt-4o-mini",
            LlmProviderKind::Anthropic => "claude-3-haiku-20240307",
            LlmProviderKind::Gemini => "gemini-1.5-flash",
            LlmProviderKind::Ollama => "llama3",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    pub ollama_url: String,
}

impl LlmConfig {
    /// Configured model, or the provider's default when none is set
    pub fn model_name(&self) -> &str {
        let model = self.model.trim();
        if model.is_empty() {
            self.provider.default_model()
        } else {
            model
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::OpenAi,
            model: String::new(),
            api_key: None,
            ollama_url: "http://localhost:11434".to_string(),
        }
    }
}

/// Which evidence sources are enabled
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSourcesConfig {
    pub duckduckgo: bool,
    pub wikipedia: bool,
    pub pubmed: bool,
    /// Wikipedia language editions to query, in order
    pub wikipedia_languages: Vec<String>,
}

impl Default for SearchSourcesConfig {
    fn default() -> Self {
        Self {
            duckduckgo: true,
            wikipedia: false,
            pubmed: true,
            wikipedia_languages: vec!["en".to_string()],
        }
    }
}

/// Verification engine limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Claims verified concurrently within one run
    pub max_concurrent_claims: usize,
    /// Evidence requested from each source per claim
    pub evidence_per_source: usize,
    /// Ceiling on collecting evidence for one claim
    pub search_timeout_secs: u64,
    /// Optional deadline for a whole run
    pub run_timeout_secs: Option<u64>,
    /// Optional cap on merged evidence per claim
    pub max_total_evidence: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_claims: 5,
            evidence_per_source: 6,
            search_timeout_secs: 15,
            run_timeout_secs: None,
            max_total_evidence: None,
        }
    }
}

impl EngineConfig {
    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_secs.map(Duration::from_secs)
    }
}

/// User-defined claim category offered to the extractor
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClaimTypeConfig {
    pub description: String,
    pub prompt_hint: String,
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub search_sources: SearchSourcesConfig,
    pub engine: EngineConfig,
    pub custom_claim_types: BTreeMap<String, ClaimTypeConfig>,
}

impl Config {
    /// Load configuration from the YAML file and environment overrides
    pub fn from_env() -> Self {
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = Self::load_config_file(&config_path).unwrap_or_default();

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Ok(model) = std::env::var(ENV_LLM_MODEL) {
            config.llm.model = model;
        }
        if config.llm.api_key.as_deref().is_none_or(is_unresolved)
            && let Some((_, key_var)) = config.llm.provider.api_key_source()
            && let Ok(key) = std::env::var(key_var)
        {
            config.llm.api_key = Some(key);
        }

        config
    }

    /// Parse YAML contents, interpolating `${VAR}` references from the environment
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        let contents = interpolate_env_vars(contents);
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&contents)
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<Config> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_yaml_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded configuration from file");
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    /// Check that the configuration can start the service
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        if let Some((provider, _)) = self.llm.provider.api_key_source()
            && self.llm.api_key.as_deref().is_none_or(is_unresolved)
        {
            return Err(ConfigError::MissingApiKey(provider));
        }

        if self.engine.max_concurrent_claims == 0 {
            return Err(ConfigError::InvalidEngine(
                "max_concurrent_claims must be at least 1",
            ));
        }
        if self.engine.evidence_per_source == 0 {
            return Err(ConfigError::InvalidEngine(
                "evidence_per_source must be at least 1",
            ));
        }

        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Replace `${VAR}` with environment values, leaving unset references untouched
fn interpolate_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            match std::env::var(&caps[1]) {
                Ok(value) if !value.is_empty() => value,
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// An empty value or an uninterpolated `${VAR}` reference
fn is_unresolved(value: &str) -> bool {
    value.trim().is_empty() || ENV_VAR_PATTERN.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::from_yaml_str("").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.max_concurrent_claims, 5);
        assert_eq!(config.engine.evidence_per_source, 6);
        assert_eq!(config.engine.search_timeout(), Duration::from_secs(15));
        assert!(config.search_sources.duckduckgo);
        assert!(!config.search_sources.wikipedia);
    }

    #[test]
    fn test_parse_sections_and_custom_types() {
        let yaml = r#"
server:
  port: 9090
llm:
  provider: ollama
  model: llama3
search_sources:
  duckduckgo: false
  pubmed: false
engine:
  max_concurrent_claims: 3
  run_timeout_secs: 120
custom_claim_types:
  regulatory:
    description: Claims about regulatory compliance
    prompt_hint: Look for references to laws
"#;
        let config = Config::from_yaml_str(yaml).unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.llm.provider, LlmProviderKind::Ollama);
        assert!(!config.search_sources.duckduckgo);
        assert_eq!(config.engine.max_concurrent_claims, 3);
        assert_eq!(config.engine.evidence_per_source, 6);
        assert_eq!(config.engine.run_timeout(), Some(Duration::from_secs(120)));
        assert!(config.custom_claim_types.contains_key("regulatory"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unset_env_reference_is_kept() {
        let out = interpolate_env_vars("api_key: ${VERITY_TEST_SURELY_UNSET_VAR}");
        assert_eq!(out, "api_key: ${VERITY_TEST_SURELY_UNSET_VAR}");
    }

    #[test]
    fn test_validate_requires_openai_key() {
        let mut config = Config::default();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey(_))
        ));

        config.llm.api_key = Some("${OPENAI_API_KEY}".to_string());
        assert!(config.validate().is_err());

        config.llm.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());

        config.engine.max_concurrent_claims = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEngine(_))
        ));
    }

    #[test]
    fn test_validate_requires_key_per_provider() {
        let yaml = r#"
llm:
  provider: anthropic
  model: claude-3-haiku-20240307
"#;
        let mut config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.llm.provider, LlmProviderKind::Anthropic);
        assert_eq!(config.llm.model_name(), "claude-3-haiku-20240307");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey("Anthropic"))
        ));

        config.llm.provider = LlmProviderKind::Gemini;
        config.llm.model = String::new();
        assert_eq!(config.llm.model_name(), "gemini-1.5-flash");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingApiKey("Gemini"))
        ));

        config.llm.api_key = Some("gm-test".to_string());
        assert!(config.validate().is_ok());

        config.llm.provider = LlmProviderKind::Ollama;
        config.llm.api_key = None;
        assert!(config.validate().is_ok());
    }
}
