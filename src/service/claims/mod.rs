//! Claim extraction service using an LLM
//!
//! Decomposes input text into atomic, independently verifiable claims.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::llm::{CompletionOptions, LanguageModel};
use crate::model::extracted::ExtractedClaims;
use crate::model::{Claim, ClaimType, ClaimTypeConfig};
use crate::service::claims::prompts::{build_extraction_prompt, build_extraction_system_prompt};
use crate::service::decode::decode_model_json;

pub mod error;
pub mod prompts;

pub use error::ExtractionError;

/// Output budget for extraction; long texts yield many claims
const EXTRACTION_MAX_TOKENS: u64 = 4096;

/// Service for extracting claims from text
pub struct ClaimExtractor {
    llm: Arc<dyn LanguageModel>,
    system_prompt: String,
    custom_type_names: Vec<String>,
}

impl ClaimExtractor {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        custom_types: &BTreeMap<String, ClaimTypeConfig>,
    ) -> Self {
        tracing::info!(
            custom_types = custom_types.len(),
            "Claim extractor initialized"
        );
        Self {
            llm,
            system_prompt: build_extraction_system_prompt(custom_types),
            custom_type_names: custom_types.keys().cloned().collect(),
        }
    }

    /// Extract pending claims from `text`, in extraction order
    pub async fn extract(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Claim>, ExtractionError> {
        let prompt = build_extraction_prompt(text);
        let options = CompletionOptions::default().with_max_tokens(EXTRACTION_MAX_TOKENS);

        tracing::debug!(
            provider = self.llm.name(),
            text_length = text.len(),
            "Initiating LLM call for claim extraction"
        );

        let start_time = std::time::Instant::now();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ExtractionError::Cancelled),
            response = self.llm.complete(Some(&self.system_prompt), &prompt, &options) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    provider = self.llm.name(),
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error = %e,
                    "Claim extraction call failed"
                );
                return Err(e.into());
            }
        };

        let extracted: ExtractedClaims = decode_model_json(&response).inspect_err(|e| {
            tracing::warn!(error = %e, "Claim extraction response could not be parsed");
        })?;

        let raw_count = extracted.claims.len();
        let claims: Vec<Claim> = extracted
            .claims
            .into_iter()
            .filter(|ec| !ec.text.trim().is_empty())
            .map(|ec| {
                Claim::pending(
                    ec.text.trim(),
                    ClaimType::from_label(&ec.claim_type, &self.custom_type_names),
                    usize::try_from(ec.sentence_index.max(0)).unwrap_or_default(),
                )
            })
            .collect();

        tracing::info!(
            provider = self.llm.name(),
            elapsed_ms = start_time.elapsed().as_millis(),
            raw_claims = raw_count,
            claims = claims.len(),
            "Claim extraction complete"
        );

        Ok(claims)
    }
}
