pub mod analysis;
pub mod claim;
pub mod config;
pub mod evidence;
pub mod extracted;

pub use analysis::*;
pub use claim::*;
pub use config::{ClaimTypeConfig, Config, EngineConfig, LlmConfig, LlmProviderKind, SearchSourcesConfig};
pub use evidence::*;
