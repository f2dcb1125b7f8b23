//! PubMed evidence source backed by the NCBI E-utilities API

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{EvidenceSource, SearchError, USER_AGENT};
use crate::model::{Evidence, EvidenceSourceType};

const SOURCE_NAME: &str = "PubMed";
const ESEARCH_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi";
const ESUMMARY_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esummary.fcgi";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArticleSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    pubdate: String,
    #[serde(default)]
    source: String,
}

/// Academic article search on PubMed
pub struct PubMedSource {
    client: Client,
}

impl PubMedSource {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>, SearchError> {
        let retmax = max_results.to_string();
        let response = self
            .client
            .get(ESEARCH_URL)
            .query(&[
                ("db", "pubmed"),
                ("term", query),
                ("retmax", retmax.as_str()),
                ("retmode", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let data: ESearchResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(data.esearchresult.idlist)
    }

    async fn fetch_summaries(&self, ids: &[String]) -> Result<Value, SearchError> {
        let response = self
            .client
            .get(ESUMMARY_URL)
            .query(&[
                ("db", "pubmed"),
                ("id", ids.join(",").as_str()),
                ("retmode", "json"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))
    }
}

impl Default for PubMedSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvidenceSource for PubMedSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, SearchError> {
        let ids = self.search_ids(query, max_results).await?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let summaries = self.fetch_summaries(&ids).await?;
        let evidences = summaries_to_evidence(&ids, &summaries);

        tracing::debug!(count = evidences.len(), "PubMed: Search completed");
        Ok(evidences)
    }
}

/// Build evidence in search order from an esummary payload.
///
/// The `result` object mixes article entries keyed by PMID with a `uids`
/// array, so entries are looked up individually.
fn summaries_to_evidence(ids: &[String], summaries: &Value) -> Vec<Evidence> {
    let Some(result) = summaries.get("result") else {
        return Vec::new();
    };

    ids.iter()
        .filter_map(|pmid| {
            let entry = result.get(pmid)?;
            let article = ArticleSummary::deserialize(entry).ok()?;
            if article.title.is_empty() {
                return None;
            }

            let mut snippet = article.title;
            if !article.source.is_empty() {
                snippet.push_str(&format!(
                    " (Published in {}, {})",
                    article.source, article.pubdate
                ));
            }

            Some(Evidence::new(
                SOURCE_NAME,
                format!("https://pubmed.ncbi.nlm.nih.gov/{}/", pmid),
                EvidenceSourceType::Academic,
                snippet,
            ))
        })
        .collect()
}
