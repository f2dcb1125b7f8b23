//! Error types for claim extraction

use thiserror::Error;

use crate::llm::ProviderError;
use crate::service::decode::DecodeError;

/// Error type for claim extraction
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractionError {
    #[error("LLM extraction failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to parse extraction response: {0}")]
    Parse(#[from] DecodeError),

    #[error("Claim extraction cancelled")]
    Cancelled,
}
