//! Database module for PostgreSQL persistence of analyses and their claims

pub mod models;
pub mod repository;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::env;

use crate::model::{AnalysisResult, Claim};

pub use repository::PgAnalysisStore;

// Environment variable names
const ENV_POSTGRES_HOST: &str = "VERITY_POSTGRES_HOST";
const ENV_POSTGRES_PORT: &str = "VERITY_POSTGRES_PORT";
const ENV_POSTGRES_USER: &str = "VERITY_POSTGRES_USER";
const ENV_POSTGRES_PASSWORD: &str = "VERITY_POSTGRES_PASSWORD";
const ENV_POSTGRES_DB: &str = "VERITY_POSTGRES_DB";

// Default values
const DEFAULT_POSTGRES_HOST: &str = "127.0.0.1";
const DEFAULT_POSTGRES_PORT: &str = "5432";
const DEFAULT_POSTGRES_USER: &str = "verity";
const DEFAULT_POSTGRES_PASSWORD: &str = "verity";
const DEFAULT_POSTGRES_DB: &str = "verity";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Persistence of analysis results and their claims
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Find the analysis previously stored for a document hash
    async fn get_analysis_by_hash(&self, hash: &str)
    -> Result<Option<AnalysisResult>, StoreError>;

    /// Insert an analysis, replacing any earlier one with the same document hash
    async fn save_analysis(&self, result: &AnalysisResult) -> Result<(), StoreError>;

    /// Store the claims of an analysis, preserving their order
    async fn save_claims(&self, analysis_id: &str, claims: &[Claim]) -> Result<(), StoreError>;

    /// Store an analysis together with its claims
    ///
    /// Stores that can should write both in one transaction, so a reader never
    /// sees the analysis without its claims.
    async fn save_result(
        &self,
        result: &AnalysisResult,
        claims: &[Claim],
    ) -> Result<(), StoreError> {
        self.save_analysis(result).await?;
        self.save_claims(&result.id, claims).await
    }

    /// Get an analysis by ID
    async fn get_analysis(&self, id: &str) -> Result<AnalysisResult, StoreError>;

    /// Claims of an analysis in extraction order
    async fn get_claims_by_analysis(&self, analysis_id: &str) -> Result<Vec<Claim>, StoreError>;

    /// Most recent analyses first
    async fn list_analyses(&self, limit: i64, offset: i64)
    -> Result<Vec<AnalysisResult>, StoreError>;

    /// Check the store is reachable
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Create a new database connection pool
pub async fn create_pool() -> Result<PgPool, StoreError> {
    let host = env::var(ENV_POSTGRES_HOST).unwrap_or_else(|_| DEFAULT_POSTGRES_HOST.to_string());
    let port = env::var(ENV_POSTGRES_PORT).unwrap_or_else(|_| DEFAULT_POSTGRES_PORT.to_string());
    let user = env::var(ENV_POSTGRES_USER).unwrap_or_else(|_| DEFAULT_POSTGRES_USER.to_string());
    let password =
        env::var(ENV_POSTGRES_PASSWORD).unwrap_or_else(|_| DEFAULT_POSTGRES_PASSWORD.to_string());
    let database = env::var(ENV_POSTGRES_DB).unwrap_or_else(|_| DEFAULT_POSTGRES_DB.to_string());

    let database_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, database
    );

    tracing::debug!(host = %host, port = %port, database = %database, "Connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    tracing::info!(host = %host, port = %port, "PostgreSQL connection established");

    Ok(pool)
}

/// Initialize database schema
pub async fn init_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id VARCHAR(64) PRIMARY KEY,
            document_hash VARCHAR(64) NOT NULL,
            overall_score DOUBLE PRECISION NOT NULL,
            total_claims INTEGER NOT NULL,
            verified_claims INTEGER NOT NULL,
            mixed_claims INTEGER NOT NULL,
            unsupported_claims INTEGER NOT NULL,
            processing_time_ms BIGINT NOT NULL,
            status VARCHAR(32) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS claims (
            id VARCHAR(64) PRIMARY KEY,
            analysis_id VARCHAR(64) NOT NULL REFERENCES analysis_results(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            claim_type VARCHAR(32) NOT NULL,
            sentence_index INTEGER NOT NULL,
            status VARCHAR(32) NOT NULL,
            confidence DOUBLE PRECISION NOT NULL,
            source_type VARCHAR(32),
            evidences JSONB NOT NULL DEFAULT '[]',
            reasoning TEXT NOT NULL DEFAULT '',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes separately
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_analysis_results_document_hash ON analysis_results(document_hash)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_results_created_at ON analysis_results(created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_claims_analysis_id ON claims(analysis_id, position)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema initialized");

    Ok(())
}
