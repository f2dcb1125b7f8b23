//! DuckDuckGo evidence source
//!
//! Combines the Instant Answer API with the HTML results page. For HTML
//! results the linked pages are fetched and reduced to readable text, falling
//! back to the result snippet when a page cannot be fetched.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use url::Url;

use super::{
    EvidenceSource, SearchError, display_domain, extract_keywords, truncate_snippet,
};
use crate::model::{Evidence, EvidenceSourceType};

const SOURCE_NAME: &str = "DuckDuckGo";
const INSTANT_ANSWER_URL: &str = "https://api.duckduckgo.com/";
const HTML_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_DELAY: Duration = Duration::from_millis(500);
const ATTEMPTS: usize = 2;

/// Pages fetched concurrently per search
const PAGE_FETCH_CONCURRENCY: usize = 3;
const MAX_PAGE_BYTES: usize = 500 * 1024;
const MAX_SNIPPET_CHARS: usize = 1000;
const MIN_PAGE_TEXT_CHARS: usize = 50;

/// Domains that block scraping
const SKIP_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
];

/// Containers tried, in order, for a page's main text
const CONTENT_SELECTORS: &[&str] = &[
    "article",
    "main",
    r#"div[class*="content"]"#,
    r#"div[class*="post"]"#,
    r#"div[class*="article"]"#,
    "body",
];

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Abstract", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

/// One organic result parsed from the HTML results page
#[derive(Debug, Clone, PartialEq)]
struct SearchHit {
    url: String,
    snippet: String,
}

/// DuckDuckGo search with page-content fetching
pub struct DuckDuckGoSource {
    client: Client,
}

impl DuckDuckGoSource {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .user_agent(BROWSER_USER_AGENT)
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    async fn search_instant_answer(
        &self,
        keywords: &str,
        max_results: usize,
    ) -> Result<Vec<Evidence>, SearchError> {
        let response = self
            .client
            .get(INSTANT_ANSWER_URL)
            .query(&[
                ("q", keywords),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        Ok(instant_answer_evidence(answer, max_results))
    }

    async fn search_html(
        &self,
        keywords: &str,
        max_results: usize,
    ) -> Result<Vec<Evidence>, SearchError> {
        let response = self
            .client
            .get(HTML_SEARCH_URL)
            .query(&[("q", keywords)])
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9,pt-PT;q=0.8")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let html = response.text().await?;
        let hits = parse_result_page(&html, max_results + 2);

        tracing::debug!(results = hits.len(), "DuckDuckGo: Found search results");

        // Fetch pages with bounded concurrency, preserving result order
        let evidences: Vec<Evidence> = stream::iter(hits)
            .map(|hit| async move {
                let content = match self.fetch_page_text(&hit.url).await {
                    Ok(text) if !text.is_empty() => text,
                    Ok(_) => hit.snippet.clone(),
                    Err(e) => {
                        tracing::debug!(url = %hit.url, error = %e, "Failed to fetch page");
                        hit.snippet.clone()
                    }
                };

                if content.trim().is_empty() {
                    return None;
                }

                Some(Evidence::new(
                    display_domain(&hit.url),
                    hit.url,
                    EvidenceSourceType::WebPage,
                    truncate_snippet(&content, MAX_SNIPPET_CHARS),
                ))
            })
            .buffered(PAGE_FETCH_CONCURRENCY)
            .filter_map(|evidence| async move { evidence })
            .take(max_results)
            .collect()
            .await;

        Ok(evidences)
    }

    /// Fetch a page and extract its readable text
    async fn fetch_page_text(&self, page_url: &str) -> Result<String, SearchError> {
        if SKIP_DOMAINS.iter().any(|d| page_url.contains(d)) {
            return Ok(String::new());
        }

        let response = self
            .client
            .get(page_url)
            .timeout(PAGE_TIMEOUT)
            .header("Accept", "text/html,application/xhtml+xml")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let body = response.bytes().await?;
        let body = &body[..body.len().min(MAX_PAGE_BYTES)];

        Ok(extract_page_text(&String::from_utf8_lossy(body)))
    }
}

impl Default for DuckDuckGoSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EvidenceSource for DuckDuckGoSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, SearchError> {
        let keywords = extract_keywords(query);
        tracing::debug!(original = %query, keywords = %keywords, "DuckDuckGo: Searching");

        let mut evidences = Vec::new();
        let mut last_error = None;

        for attempt in 1..=ATTEMPTS {
            match self.search_instant_answer(&keywords, max_results).await {
                Ok(found) => {
                    evidences.extend(found);
                    break;
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "DuckDuckGo instant answer failed");
                    last_error = Some(e);
                    if attempt < ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        for attempt in 1..=ATTEMPTS {
            match self.search_html(&keywords, max_results).await {
                Ok(found) => {
                    evidences.extend(found);
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "DuckDuckGo HTML search failed");
                    last_error = Some(e);
                    if attempt < ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    }
                }
            }
        }

        let unique = dedup_by_url(evidences, max_results);
        tracing::debug!(count = unique.len(), "DuckDuckGo: Search completed");

        match last_error {
            Some(e) if unique.is_empty() => Err(e),
            _ => Ok(unique),
        }
    }
}

fn instant_answer_evidence(answer: InstantAnswer, max_results: usize) -> Vec<Evidence> {
    let mut evidences = Vec::new();

    if !answer.abstract_text.is_empty() {
        evidences.push(Evidence::new(
            SOURCE_NAME,
            answer.abstract_url,
            EvidenceSourceType::SearchEngine,
            answer.abstract_text,
        ));
    }

    for topic in answer.related_topics {
        if evidences.len() >= max_results {
            break;
        }
        if !topic.text.is_empty() {
            evidences.push(Evidence::new(
                SOURCE_NAME,
                topic.first_url,
                EvidenceSourceType::SearchEngine,
                topic.text,
            ));
        }
    }

    evidences
}

/// Keep the first evidence per URL, dropping empty snippets
fn dedup_by_url(evidences: Vec<Evidence>, max_results: usize) -> Vec<Evidence> {
    let mut seen = HashSet::new();
    evidences
        .into_iter()
        .filter(|e| !e.snippet.trim().is_empty() && seen.insert(e.source_url.clone()))
        .take(max_results)
        .collect()
}

/// Parse organic results from the HTML results page
fn parse_result_page(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let (Ok(link_selector), Ok(snippet_selector)) = (
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let snippets: Vec<String> = document
        .select(&snippet_selector)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .collect();

    document
        .select(&link_selector)
        .enumerate()
        .filter_map(|(i, link)| {
            let href = link.value().attr("href")?;
            let url = decode_redirect_url(href);
            if url.is_empty() || url.starts_with("//duckduckgo.com") {
                return None;
            }
            Some(SearchHit {
                url,
                snippet: snippets.get(i).cloned().unwrap_or_default(),
            })
        })
        .take(max_results)
        .collect()
}

/// Resolve DuckDuckGo's `/l/?uddg=` redirect links to the target URL
fn decode_redirect_url(raw: &str) -> String {
    if !raw.contains("uddg=") {
        return raw.to_string();
    }

    let absolute = if raw.starts_with("//") {
        format!("https:{}", raw)
    } else if raw.starts_with('/') {
        format!("https://duckduckgo.com{}", raw)
    } else {
        raw.to_string()
    };

    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "uddg")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| raw.to_string())
}

/// Extract readable text from the main content area of a page
fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = readable_text(element);
            if text.chars().count() >= MIN_PAGE_TEXT_CHARS {
                return text;
            }
        }
    }

    String::new()
}

/// Text of an element, skipping script and style content
fn readable_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    collapse_whitespace(&out)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
