//! Content hashing for document deduplication

use sha2::{Digest, Sha256};

/// Normalize input text before hashing: unify line endings and trim
pub fn normalize_text(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").trim().to_string()
}

/// SHA-256 of the normalized text as lowercase hex
pub fn document_hash(text: &str) -> String {
    hash_string(&normalize_text(text))
}

/// Hash a string to a hex string using SHA256
fn hash_string(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    format!("{:x}", hasher.finalize())
}
