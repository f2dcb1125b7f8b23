//! Wikipedia evidence source
//!
//! Searches each configured language edition in order and returns the intro
//! extract of matching articles.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{EvidenceSource, SearchError, USER_AGENT, extract_keywords, truncate_snippet};
use crate::model::{Evidence, EvidenceSourceType};

const SOURCE_NAME: &str = "Wikipedia";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_SNIPPET_CHARS: usize = 600;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    query: SearchQuery,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    pageid: u64,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    query: ExtractQuery,
}

#[derive(Debug, Deserialize)]
struct ExtractQuery {
    #[serde(default)]
    pages: HashMap<String, Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
}

/// Wikipedia search across one or more language editions
pub struct WikipediaSource {
    client: Client,
    languages: Vec<String>,
}

impl WikipediaSource {
    pub fn new(languages: Vec<String>) -> Self {
        let languages = if languages.is_empty() {
            vec!["en".to_string()]
        } else {
            languages
        };

        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
            languages,
        }
    }

    async fn search_language(
        &self,
        lang: &str,
        keywords: &str,
        max_results: usize,
    ) -> Result<Vec<Evidence>, SearchError> {
        let api_url = format!("https://{}.wikipedia.org/w/api.php", lang);
        let limit = max_results.to_string();

        let response = self
            .client
            .get(&api_url)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", keywords),
                ("format", "json"),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        if search.query.search.is_empty() {
            return Ok(Vec::new());
        }

        let page_ids: Vec<String> = search
            .query
            .search
            .iter()
            .map(|hit| hit.pageid.to_string())
            .collect();

        let response = self
            .client
            .get(&api_url)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "true"),
                ("explaintext", "true"),
                ("pageids", page_ids.join("|").as_str()),
                ("format", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let extracts: ExtractResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(pages_to_evidence(lang, &page_ids, extracts.query.pages))
    }
}

#[async_trait]
impl EvidenceSource for WikipediaSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, SearchError> {
        let keywords = extract_keywords(query);
        tracing::debug!(original = %query, keywords = %keywords, "Wikipedia: Searching");

        let mut evidences = Vec::new();

        for lang in &self.languages {
            if evidences.len() >= max_results {
                break;
            }

            let remaining = max_results - evidences.len();
            match self.search_language(lang, &keywords, remaining).await {
                Ok(found) => evidences.extend(found),
                Err(e) => {
                    tracing::warn!(lang = %lang, error = %e, "Wikipedia search failed for language");
                }
            }
        }

        tracing::debug!(count = evidences.len(), "Wikipedia: Search completed");
        Ok(evidences)
    }
}

/// Label for a language edition, e.g. `Wikipedia (PT)`
fn edition_name(lang: &str) -> String {
    if lang == "en" {
        SOURCE_NAME.to_string()
    } else {
        format!("{} ({})", SOURCE_NAME, lang.to_uppercase())
    }
}

fn article_url(lang: &str, title: &str) -> String {
    let mut url = format!("https://{}.wikipedia.org/wiki/", lang);
    url.extend(url::form_urlencoded::byte_serialize(
        title.replace(' ', "_").as_bytes(),
    ));
    url
}

/// Convert extracts to evidence, following the search ranking order
fn pages_to_evidence(
    lang: &str,
    page_ids: &[String],
    mut pages: HashMap<String, Page>,
) -> Vec<Evidence> {
    let source_name = edition_name(lang);

    page_ids
        .iter()
        .filter_map(|id| pages.remove(id))
        .filter(|page| !page.extract.trim().is_empty())
        .map(|page| {
            Evidence::new(
                source_name.clone(),
                article_url(lang, &page.title),
                EvidenceSourceType::Encyclopedia,
                truncate_snippet(&page.extract, MAX_SNIPPET_CHARS),
            )
        })
        .collect()
}
