//! Tolerant decoding of structured JSON from free-text model output
//!
//! Models often wrap JSON in a fenced code block or surround it with prose.
//! Decoding tries, in order: the trimmed text as-is, the contents of the first
//! fenced block, and the span from the first `{` to the last `}`.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json|JSON)?\s*([\s\S]*?)\s*```").expect("valid fenced block pattern")
});

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("no JSON object found in response")]
    NoJson,

    #[error("invalid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Decode a JSON value of type `T` from model output
pub fn decode_model_json<T: DeserializeOwned>(response: &str) -> Result<T, DecodeError> {
    let trimmed = response.trim();

    let mut last_error = match serde_json::from_str(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    let candidate = match FENCED_BLOCK.captures(trimmed).and_then(|caps| caps.get(1)) {
        Some(block) => {
            match serde_json::from_str(block.as_str()) {
                Ok(value) => return Ok(value),
                Err(e) => last_error = e,
            }
            block.as_str()
        }
        None => trimmed,
    };

    match (candidate.find('{'), candidate.rfind('}')) {
        (Some(start), Some(end)) if end > start => {
            Ok(serde_json::from_str(&candidate[start..=end])?)
        }
        _ if candidate.contains('{') || candidate.contains('[') => {
            Err(DecodeError::Invalid(last_error))
        }
        _ => Err(DecodeError::NoJson),
    }
}
