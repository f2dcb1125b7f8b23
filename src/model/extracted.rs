//! LLM response shapes for claim extraction and adjudication

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// JSON Schema of a response shape, pretty-printed for inclusion in a prompt
pub fn response_schema<T: JsonSchema>() -> String {
    serde_json::to_string_pretty(&schemars::schema_for!(T)).unwrap_or_default()
}

/// Claim extraction response
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedClaims {
    pub claims: Vec<ExtractedClaim>,
}

/// A single extracted claim
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedClaim {
    pub text: String,
    #[serde(rename = "type", default)]
    pub claim_type: String,
    /// 0-indexed position of the source sentence
    #[serde(default)]
    pub sentence_index: i64,
}

/// Adjudication response for one claim
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedVerdict {
    /// One of: verified, mixed, unsupported
    #[serde(rename = "verification_status")]
    pub status: String,
    /// Confidence between 0.0 and 1.0
    #[serde(rename = "confidence_score", default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}
