use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSourceType {
    WebPage,
    SearchEngine,
    Encyclopedia,
    Academic,
}

impl EvidenceSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceSourceType::WebPage => "web_page",
            EvidenceSourceType::SearchEngine => "search_engine",
            EvidenceSourceType::Encyclopedia => "encyclopedia",
            EvidenceSourceType::Academic => "academic",
        }
    }
}

/// A retrieved snippet plus source metadata, used to adjudicate a claim
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Evidence {
    pub id: String,
    pub source_name: String,
    pub source_url: String,
    pub source_type: EvidenceSourceType,
    pub snippet: String,
    #[serde(default)]
    pub relevance_score: f64,
    pub retrieved_at: DateTime<Utc>,
}

impl Evidence {
    pub fn new(
        source_name: impl Into<String>,
        source_url: impl Into<String>,
        source_type: EvidenceSourceType,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_name: source_name.into(),
            source_url: source_url.into(),
            source_type,
            snippet: snippet.into(),
            relevance_score: 0.0,
            retrieved_at: Utc::now(),
        }
    }
}
