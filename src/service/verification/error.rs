//! Error types for claim verification

use thiserror::Error;

use crate::llm::ProviderError;
use crate::service::decode::DecodeError;

/// Error type for claim verification
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VerificationError {
    #[error("LLM verification failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to parse verification response: {0}")]
    Parse(#[from] DecodeError),

    #[error("Claim verification cancelled")]
    Cancelled,
}
