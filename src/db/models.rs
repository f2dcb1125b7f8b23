//! Database models for analyses and claims

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::model::{AnalysisResult, Claim, ClaimType, Evidence, SourceType, VerificationStatus};

/// Database representation of an analysis result
#[derive(Debug, Clone, FromRow)]
pub struct AnalysisRow {
    pub id: String,
    pub document_hash: String,
    pub overall_score: f64,
    pub total_claims: i32,
    pub verified_claims: i32,
    pub mixed_claims: i32,
    pub unsupported_claims: i32,
    pub processing_time_ms: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRow {
    /// Convert database row to domain model
    pub fn into_domain(self) -> AnalysisResult {
        AnalysisResult {
            id: self.id,
            document_hash: self.document_hash,
            overall_score: self.overall_score,
            total_claims: count_from_db(self.total_claims),
            verified_claims: count_from_db(self.verified_claims),
            mixed_claims: count_from_db(self.mixed_claims),
            unsupported_claims: count_from_db(self.unsupported_claims),
            processing_time_ms: self.processing_time_ms,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Database representation of a claim
#[derive(Debug, Clone, FromRow)]
pub struct ClaimRow {
    pub id: String,
    pub analysis_id: String,
    pub position: i32,
    pub text: String,
    pub claim_type: String,
    pub sentence_index: i32,
    pub status: String,
    pub confidence: f64,
    pub source_type: Option<String>,
    pub evidences: serde_json::Value,
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

impl ClaimRow {
    /// Convert database row to domain model
    pub fn into_domain(self) -> Result<Claim, String> {
        let status = VerificationStatus::parse(&self.status)
            .ok_or_else(|| format!("Unknown claim status: {}", self.status))?;
        let evidences: Vec<Evidence> = serde_json::from_value(self.evidences)
            .map_err(|e| format!("Invalid evidences for claim {}: {}", self.id, e))?;

        Ok(Claim {
            id: self.id,
            text: self.text,
            claim_type: ClaimType::parse(&self.claim_type).unwrap_or(ClaimType::Factual),
            sentence_index: count_from_db(self.sentence_index),
            status,
            confidence: self.confidence,
            source_type: self.source_type.as_deref().and_then(SourceType::parse),
            evidences,
            reasoning: self.reasoning,
            created_at: self.created_at,
        })
    }
}

/// Convert the ordered claim rows of one analysis
///
/// Rows must belong to `analysis_id` and carry contiguous positions from zero.
pub fn claims_from_rows(analysis_id: &str, rows: Vec<ClaimRow>) -> Result<Vec<Claim>, String> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            if row.analysis_id != analysis_id {
                return Err(format!(
                    "Claim {} belongs to analysis {}, not {}",
                    row.id, row.analysis_id, analysis_id
                ));
            }
            if count_from_db(row.position) != index || row.position < 0 {
                return Err(format!(
                    "Claim {} of analysis {} is at position {}, expected {}",
                    row.id, analysis_id, row.position, index
                ));
            }
            row.into_domain()
        })
        .collect()
}

/// Counts are stored as INTEGER; negative values never occur in valid rows
pub fn count_from_db(value: i32) -> usize {
    usize::try_from(value).unwrap_or_default()
}

pub fn count_to_db(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Query parameters for listing analyses
#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
pub struct ListAnalysesQuery {
    /// Page size (default 20, max 100)
    pub limit: Option<i64>,
    /// Number of analyses to skip
    pub offset: Option<i64>,
}

/// A page of analyses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalysisPage {
    pub results: Vec<AnalysisResult>,
    pub limit: i64,
    pub offset: i64,
}
