pub mod aggregator;
pub mod cache;
pub mod claims;
pub mod decode;
pub mod engine;
pub mod hashing;
pub mod scoring;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::ResultCache;
pub use engine::{EngineError, VerificationEngine};
