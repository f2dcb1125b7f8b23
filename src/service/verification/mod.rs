//! Claim adjudication service using an LLM
//!
//! A claim is judged either against retrieved evidence or, when no evidence
//! is available, against the model's own knowledge.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::llm::{CompletionOptions, LanguageModel};
use crate::model::extracted::ExtractedVerdict;
use crate::model::{Evidence, VerificationStatus};
use crate::service::decode::decode_model_json;
use crate::service::verification::prompts::{
    EVIDENCE_SYSTEM_PROMPT, KNOWLEDGE_SYSTEM_PROMPT, build_evidence_prompt,
    build_knowledge_prompt,
};

pub mod error;
pub mod prompts;

pub use error::VerificationError;

/// Reasoning recorded when there is nothing to adjudicate against
pub const NO_EVIDENCE_REASONING: &str = "No evidence found to support this claim";

/// Suffix appended to knowledge-only reasoning
pub const KNOWLEDGE_ONLY_DISCLAIMER: &str =
    " [Note: Verified using model knowledge only, without external evidence sources]";

/// Adjudication outcome for one claim
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: VerificationStatus,
    /// Always within [0, 1]
    pub confidence: f64,
    pub reasoning: String,
}

impl From<ExtractedVerdict> for Verdict {
    fn from(raw: ExtractedVerdict) -> Self {
        let confidence = if raw.confidence.is_finite() {
            raw.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            status: VerificationStatus::from_verdict(&raw.status),
            confidence,
            reasoning: raw.reasoning.trim().to_string(),
        }
    }
}

/// Service for verifying claims
pub struct ClaimVerifier {
    llm: Arc<dyn LanguageModel>,
}

impl ClaimVerifier {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Judge a claim against evidence; empty evidence never reaches the model
    pub async fn verify_with_evidence(
        &self,
        claim: &str,
        evidences: &[Evidence],
        cancel: &CancellationToken,
    ) -> Result<Verdict, VerificationError> {
        if evidences.is_empty() {
            return Ok(Verdict {
                status: VerificationStatus::Unsupported,
                confidence: 0.0,
                reasoning: NO_EVIDENCE_REASONING.to_string(),
            });
        }

        let prompt = build_evidence_prompt(claim, evidences);
        let verdict = self
            .adjudicate(&EVIDENCE_SYSTEM_PROMPT, &prompt, cancel)
            .await?;

        tracing::debug!(
            status = verdict.status.as_str(),
            confidence = verdict.confidence,
            evidence_count = evidences.len(),
            "Evidence-backed verification complete"
        );

        Ok(verdict)
    }

    /// Judge a claim from model knowledge alone
    pub async fn verify_with_knowledge(
        &self,
        claim: &str,
        cancel: &CancellationToken,
    ) -> Result<Verdict, VerificationError> {
        let prompt = build_knowledge_prompt(claim);
        let mut verdict = self
            .adjudicate(&KNOWLEDGE_SYSTEM_PROMPT, &prompt, cancel)
            .await?;
        verdict.reasoning.push_str(KNOWLEDGE_ONLY_DISCLAIMER);

        tracing::debug!(
            status = verdict.status.as_str(),
            confidence = verdict.confidence,
            "Knowledge-only verification complete"
        );

        Ok(verdict)
    }

    async fn adjudicate(
        &self,
        system: &str,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Verdict, VerificationError> {
        let options = CompletionOptions::default();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(VerificationError::Cancelled),
            response = self.llm.complete(Some(system), prompt, &options) => response?,
        };

        let raw: ExtractedVerdict = decode_model_json(&response)?;
        Ok(raw.into())
    }
}
