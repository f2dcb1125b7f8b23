//! Evidence sources queried for claims

mod duckduckgo;
mod pubmed;
mod wikipedia;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::model::{Evidence, SearchSourcesConfig};

pub use duckduckgo::DuckDuckGoSource;
pub use pubmed::PubMedSource;
pub use wikipedia::WikipediaSource;

const USER_AGENT: &str = "Verity/1.0 (Fact-checking tool)";

/// Maximum number of keywords kept for a search query
const MAX_KEYWORDS: usize = 12;

const STOP_WORDS: &[&str] = &[
    // English
    "the", "is", "are", "was", "were", "in", "on", "at", "to", "for", "of", "and", "an", "has",
    "have", "it", "its", "this", "that", "with", "be", "been", "being", "by", "from", "or",
    "but", "not", "also",
    // Portuguese
    "a", "o", "e", "de", "da", "do", "em", "para", "com", "por", "que", "um", "uma", "os", "as",
    "no", "na", "é", "são", "foi", "está", "tem", "sobre", "fez", "fazer", "como", "mais",
    "menos", "muito", "pouco", "seu", "sua", "ele", "ela", "eles", "elas", "nos", "das", "dos",
    "nas", "aos", "pela", "pelo", "entre", "após", "até", "desde",
];

const TRIM_CHARS: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\'', '(', ')', '[', ']', '«', '»'];

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SearchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

/// A searchable source of evidence snippets
#[async_trait]
pub trait EvidenceSource: Send + Sync {
    /// Source name used for attribution and warnings
    fn name(&self) -> &str;

    /// Whether the source is configured and usable
    fn is_available(&self) -> bool {
        true
    }

    /// Fetch up to `max_results` evidence snippets for `query`
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, SearchError>;
}

/// Build the evidence sources enabled in configuration
pub fn build_sources(config: &SearchSourcesConfig) -> Vec<Arc<dyn EvidenceSource>> {
    let mut sources: Vec<Arc<dyn EvidenceSource>> = Vec::new();

    if config.duckduckgo {
        sources.push(Arc::new(DuckDuckGoSource::new()));
    }
    if config.wikipedia {
        sources.push(Arc::new(WikipediaSource::new(
            config.wikipedia_languages.clone(),
        )));
    }
    if config.pubmed {
        sources.push(Arc::new(PubMedSource::new()));
    }

    tracing::info!(
        sources = ?sources.iter().map(|s| s.name().to_string()).collect::<Vec<_>>(),
        "Evidence sources configured"
    );

    sources
}

/// Reduce a claim to search keywords, capitalised terms first
pub fn extract_keywords(claim: &str) -> String {
    let mut priority = Vec::new();
    let mut regular = Vec::new();

    for word in claim.split_whitespace() {
        let is_proper_noun = word.chars().next().is_some_and(char::is_uppercase);
        let clean = word.trim_matches(TRIM_CHARS);
        let lower = clean.to_lowercase();

        if lower.chars().count() <= 2 || STOP_WORDS.contains(&lower.as_str()) {
            continue;
        }

        if is_proper_noun {
            priority.push(clean.to_string());
        } else {
            regular.push(lower);
        }
    }

    priority
        .into_iter()
        .chain(regular)
        .take(MAX_KEYWORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Truncate to `max_chars` characters, appending an ellipsis when cut
fn truncate_snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

/// Host name without a leading `www.`, used as the source name for web pages
fn display_domain(raw_url: &str) -> String {
    Url::parse(raw_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "Web".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_keywords_prioritises_proper_nouns() {
        let keywords = extract_keywords("The population of Lisbon is about 545,000 people.");
        assert_eq!(keywords, "Lisbon population about 545,000 people");
    }

    #[test]
    fn test_extract_keywords_caps_length() {
        let claim = "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima mike november";
        assert_eq!(extract_keywords(claim).split(' ').count(), MAX_KEYWORDS);
    }

    #[test]
    fn test_extract_keywords_drops_portuguese_stop_words() {
        assert_eq!(extract_keywords("Portugal tem mais de dez milhões"), "Portugal dez milhões");
    }

    #[test]
    fn test_truncate_snippet_is_char_safe() {
        assert_eq!(truncate_snippet("ação", 10), "ação");
        assert_eq!(truncate_snippet("açãoação", 4), "ação...");
    }

    #[test]
    fn test_display_domain() {
        assert_eq!(display_domain("https://www.example.org/a/b"), "example.org");
        assert_eq!(display_domain("not a url"), "Web");
    }
}
