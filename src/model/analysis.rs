use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Claim;

/// Status recorded for an analysis that ran to completion
pub const ANALYSIS_STATUS_COMPLETED: &str = "completed";

// Document-level result of one verification run
// Invariant: verified_claims + mixed_claims + unsupported_claims == total_claims
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisResult {
    pub id: String,
    pub document_hash: String,
    /// Trust score in [0, 10]
    pub overall_score: f64,
    pub total_claims: usize,
    pub verified_claims: usize,
    pub mixed_claims: usize,
    pub unsupported_claims: usize,
    pub processing_time_ms: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Non-fatal diagnostic attached to a run (never persisted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Warning {
    pub source: String,
    pub message: String,
}

impl Warning {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

/// Analysis, its claims and any warnings collected during the run
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerificationResponse {
    pub id: String,
    pub document_hash: String,
    pub analysis: AnalysisResult,
    pub claims: Vec<Claim>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Warning>,
}

impl VerificationResponse {
    pub fn new(analysis: AnalysisResult, claims: Vec<Claim>, warnings: Vec<Warning>) -> Self {
        Self {
            id: analysis.id.clone(),
            document_hash: analysis.document_hash.clone(),
            analysis,
            claims,
            warnings,
        }
    }
}

/// Request body for text verification
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyRequest {
    #[serde(default)]
    pub text: String,
}
