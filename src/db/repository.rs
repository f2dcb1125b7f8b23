//! PostgreSQL repository for analyses and claims

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

use super::models::{AnalysisRow, ClaimRow, claims_from_rows, count_to_db};
use super::{AnalysisStore, StoreError};
use crate::model::{AnalysisResult, Claim};

const MAX_PAGE_SIZE: i64 = 100;

/// Analysis store backed by PostgreSQL
#[derive(Clone)]
pub struct PgAnalysisStore {
    pool: PgPool,
}

impl PgAnalysisStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalysisStore for PgAnalysisStore {
    async fn get_analysis_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<AnalysisResult>, StoreError> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT * FROM analysis_results WHERE document_hash = $1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(AnalysisRow::into_domain))
    }

    async fn save_analysis(&self, result: &AnalysisResult) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        write_analysis(&mut tx, result).await?;
        tx.commit().await?;

        tracing::debug!(id = %result.id, hash = %result.document_hash, "Saved analysis");
        Ok(())
    }

    async fn save_claims(&self, analysis_id: &str, claims: &[Claim]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        write_claims(&mut tx, analysis_id, claims).await?;
        tx.commit().await?;

        tracing::debug!(analysis_id = %analysis_id, count = claims.len(), "Saved claims");
        Ok(())
    }

    async fn save_result(
        &self,
        result: &AnalysisResult,
        claims: &[Claim],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        write_analysis(&mut tx, result).await?;
        write_claims(&mut tx, &result.id, claims).await?;
        tx.commit().await?;

        tracing::debug!(id = %result.id, count = claims.len(), "Saved analysis with claims");
        Ok(())
    }

    async fn get_analysis(&self, id: &str) -> Result<AnalysisResult, StoreError> {
        let row: AnalysisRow = sqlx::query_as(
            r#"
            SELECT * FROM analysis_results WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        Ok(row.into_domain())
    }

    async fn get_claims_by_analysis(&self, analysis_id: &str) -> Result<Vec<Claim>, StoreError> {
        let rows: Vec<ClaimRow> = sqlx::query_as(
            r#"
            SELECT * FROM claims WHERE analysis_id = $1 ORDER BY position ASC
            "#,
        )
        .bind(analysis_id)
        .fetch_all(&self.pool)
        .await?;

        claims_from_rows(analysis_id, rows).map_err(StoreError::Serialization)
    }

    async fn list_analyses(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AnalysisResult>, StoreError> {
        let rows: Vec<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT * FROM analysis_results
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit.clamp(1, MAX_PAGE_SIZE))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AnalysisRow::into_domain).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Upsert an analysis, removing any earlier analysis of the same document
async fn write_analysis(conn: &mut PgConnection, result: &AnalysisResult) -> Result<(), StoreError> {
    // A newer run for the same document replaces the older one (and its claims)
    sqlx::query(
        r#"
        DELETE FROM analysis_results WHERE document_hash = $1 AND id <> $2
        "#,
    )
    .bind(&result.document_hash)
    .bind(&result.id)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO analysis_results (
            id, document_hash, overall_score,
            total_claims, verified_claims, mixed_claims, unsupported_claims,
            processing_time_ms, status, created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            overall_score = EXCLUDED.overall_score,
            total_claims = EXCLUDED.total_claims,
            verified_claims = EXCLUDED.verified_claims,
            mixed_claims = EXCLUDED.mixed_claims,
            unsupported_claims = EXCLUDED.unsupported_claims,
            processing_time_ms = EXCLUDED.processing_time_ms,
            status = EXCLUDED.status
        "#,
    )
    .bind(&result.id)
    .bind(&result.document_hash)
    .bind(result.overall_score)
    .bind(count_to_db(result.total_claims))
    .bind(count_to_db(result.verified_claims))
    .bind(count_to_db(result.mixed_claims))
    .bind(count_to_db(result.unsupported_claims))
    .bind(result.processing_time_ms)
    .bind(&result.status)
    .bind(result.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Replace the claims of an analysis, recording their order
async fn write_claims(
    conn: &mut PgConnection,
    analysis_id: &str,
    claims: &[Claim],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM claims WHERE analysis_id = $1")
        .bind(analysis_id)
        .execute(&mut *conn)
        .await?;

    for (position, claim) in claims.iter().enumerate() {
        let evidences = serde_json::to_value(&claim.evidences)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO claims (
                id, analysis_id, position, text, claim_type, sentence_index,
                status, confidence, source_type, evidences, reasoning, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(&claim.id)
        .bind(analysis_id)
        .bind(count_to_db(position))
        .bind(&claim.text)
        .bind(claim.claim_type.as_str())
        .bind(count_to_db(claim.sentence_index))
        .bind(claim.status.as_str())
        .bind(claim.confidence)
        .bind(claim.source_type.map(|s| s.as_str()))
        .bind(&evidences)
        .bind(&claim.reasoning)
        .bind(claim.created_at)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}
