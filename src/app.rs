//! Application state and service initialization
//!
//! Builds the dependency graph once at startup: store, optional cache,
//! language model, evidence sources and the verification engine on top.

use std::sync::Arc;

use crate::db::{AnalysisStore, PgAnalysisStore};
use crate::model::Config;
use crate::service::{ResultCache, VerificationEngine};

/// Shared state injected into Actix-web handlers
pub struct AppState {
    /// Persistent analysis store
    pub store: Arc<dyn AnalysisStore>,
    /// Redis response cache (optional)
    pub cache: Option<ResultCache>,
    /// Verification pipeline
    pub engine: Arc<VerificationEngine>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Database connection and schema initialization
    /// 2. Redis cache initialization (optional)
    /// 3. Language model and evidence source construction
    /// 4. Engine construction
    pub async fn new(config: &Config) -> Result<Self, AppError> {
        let pool = crate::db::create_pool()
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        crate::db::init_schema(&pool)
            .await
            .map_err(|e| AppError::DatabaseInit(e.to_string()))?;

        let store: Arc<dyn AnalysisStore> = Arc::new(PgAnalysisStore::new(pool));

        // Will log a warning and run uncached if Redis is unavailable
        let cache = match ResultCache::new().await {
            Ok(cache) => {
                tracing::info!("Redis cache enabled");
                Some(cache)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis cache unavailable, running without cache");
                None
            }
        };

        let llm = crate::llm::build_language_model(&config.llm)
            .map_err(|e| AppError::InvalidConfig(e.to_string()))?;

        let sources = crate::search::build_sources(&config.search_sources);

        let engine = VerificationEngine::from_config(
            config,
            llm,
            sources,
            Arc::clone(&store),
            cache.clone(),
        );

        Ok(Self {
            store,
            cache,
            engine: Arc::new(engine),
        })
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Database initialization failed
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
