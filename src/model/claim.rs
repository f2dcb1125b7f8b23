use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::Evidence;

/// Category of an extracted claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Statistical,
    Factual,
    Temporal,
    Geographic,
    Citation,
    Comparative,
    Causal,
    Custom,
}

impl ClaimType {
    /// Map a model-provided label to a claim type.
    ///
    /// Labels matching a configured custom type map to `Custom`; anything
    /// unrecognised falls back to `Factual`.
    pub fn from_label(label: &str, custom_types: &[String]) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "statistical" => ClaimType::Statistical,
            "factual" => ClaimType::Factual,
            "temporal" => ClaimType::Temporal,
            "geographic" => ClaimType::Geographic,
            "citation" => ClaimType::Citation,
            "comparative" => ClaimType::Comparative,
            "causal" => ClaimType::Causal,
            "custom" => ClaimType::Custom,
            other => {
                if custom_types
                    .iter()
                    .any(|name| name.eq_ignore_ascii_case(other))
                {
                    ClaimType::Custom
                } else {
                    ClaimType::Factual
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Statistical => "statistical",
            ClaimType::Factual => "factual",
            ClaimType::Temporal => "temporal",
            ClaimType::Geographic => "geographic",
            ClaimType::Citation => "citation",
            ClaimType::Comparative => "comparative",
            ClaimType::Causal => "causal",
            ClaimType::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "statistical" => Some(ClaimType::Statistical),
            "factual" => Some(ClaimType::Factual),
            "temporal" => Some(ClaimType::Temporal),
            "geographic" => Some(ClaimType::Geographic),
            "citation" => Some(ClaimType::Citation),
            "comparative" => Some(ClaimType::Comparative),
            "causal" => Some(ClaimType::Causal),
            "custom" => Some(ClaimType::Custom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Verified,
    Mixed,
    Unsupported,
}

impl VerificationStatus {
    /// Parse an adjudication label; unknown values degrade to `Unsupported`
    pub fn from_verdict(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "verified" => VerificationStatus::Verified,
            "mixed" => VerificationStatus::Mixed,
            _ => VerificationStatus::Unsupported,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Mixed => "mixed",
            VerificationStatus::Unsupported => "unsupported",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(VerificationStatus::Pending),
            "verified" => Some(VerificationStatus::Verified),
            "mixed" => Some(VerificationStatus::Mixed),
            "unsupported" => Some(VerificationStatus::Unsupported),
            _ => None,
        }
    }
}

/// How a claim's verdict was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    EvidenceBacked,
    ModelBased,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::EvidenceBacked => "evidence_backed",
            SourceType::ModelBased => "model_based",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "evidence_backed" => Some(SourceType::EvidenceBacked),
            "model_based" => Some(SourceType::ModelBased),
            _ => None,
        }
    }
}

// An atomic factual statement extracted from the input text
// - status/confidence/reasoning: the adjudication outcome
// - source_type: whether the outcome is backed by retrieved evidence
// - evidences: snippets the verdict was reached against (owned by this claim)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Claim {
    pub id: String,
    pub text: String,
    #[serde(rename = "type")]
    pub claim_type: ClaimType,
    pub sentence_index: usize,
    pub status: VerificationStatus,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<SourceType>,
    #[serde(default)]
    pub evidences: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reasoning: String,
    pub created_at: DateTime<Utc>,
}

/// Terminal outcome of verifying one claim
#[derive(Debug, Clone)]
pub struct ClaimOutcome {
    pub status: VerificationStatus,
    pub confidence: f64,
    pub reasoning: String,
    pub source_type: SourceType,
    pub evidences: Vec<Evidence>,
}

impl Claim {
    /// Create a freshly extracted claim awaiting verification
    pub fn pending(text: impl Into<String>, claim_type: ClaimType, sentence_index: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            claim_type,
            sentence_index,
            status: VerificationStatus::Pending,
            confidence: 0.0,
            source_type: None,
            evidences: Vec::new(),
            reasoning: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Apply the verification outcome, consuming the pending claim
    pub fn resolve(self, outcome: ClaimOutcome) -> Self {
        Self {
            status: outcome.status,
            confidence: outcome.confidence.clamp(0.0, 1.0),
            reasoning: outcome.reasoning,
            source_type: Some(outcome.source_type),
            evidences: outcome.evidences,
            created_at: Utc::now(),
            ..self
        }
    }

    /// Short prefix of the claim text for log fields
    pub fn preview(&self) -> String {
        self.text.chars().take(50).collect()
    }
}
