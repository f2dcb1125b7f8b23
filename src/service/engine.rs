//! Verification engine: the pipeline from raw text to a scored result
//!
//! A run hashes the normalized text and returns an earlier result for the same
//! document when one exists. Otherwise it extracts claims, verifies them with
//! bounded concurrency, scores the document and hands persistence off to a
//! detached task.
//!
//! Only extraction failures fail a run. Search problems become warnings and a
//! claim whose verification fails is recorded as unsupported.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::db::AnalysisStore;
use crate::llm::LanguageModel;
use crate::model::{
    ANALYSIS_STATUS_COMPLETED, AnalysisResult, Claim, ClaimOutcome, Config, EngineConfig,
    Evidence, SourceType, VerificationResponse, VerificationStatus, Warning,
};
use crate::search::EvidenceSource;
use crate::service::aggregator::{
    EvidenceAggregator, NO_SOURCES_WARNING_MESSAGE, NO_SOURCES_WARNING_SOURCE,
};
use crate::service::cache::{CacheError, ResultCache};
use crate::service::claims::{ClaimExtractor, ExtractionError};
use crate::service::hashing::{document_hash, normalize_text};
use crate::service::scoring::ClaimTally;
use crate::service::verification::{ClaimVerifier, Verdict, VerificationError};

/// Reasoning recorded when the verifier call fails
pub const VERIFICATION_ERROR_REASONING: &str = "Verification error";

/// Reasoning recorded when the knowledge-only fallback for an evidence-less claim fails
pub const NO_EVIDENCE_ERROR_REASONING: &str = "Verification error - no evidence found";

/// Reasoning recorded when the run is cancelled before a claim resolves
pub const VERIFICATION_CANCELLED_REASONING: &str = "Verification cancelled";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum EngineError {
    #[error("Text is required")]
    EmptyInput,

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Limits applied to each run
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_concurrent_claims: usize,
    pub evidence_per_source: usize,
    pub search_timeout: Duration,
    pub run_timeout: Option<Duration>,
    pub max_total_evidence: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for EngineSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_concurrent_claims: config.max_concurrent_claims.max(1),
            evidence_per_source: config.evidence_per_source.max(1),
            search_timeout: config.search_timeout(),
            run_timeout: config.run_timeout(),
            max_total_evidence: config.max_total_evidence,
        }
    }
}

/// Everything a claim task needs, shared across the tasks of all runs
struct ClaimPipeline {
    verifier: ClaimVerifier,
    aggregator: EvidenceAggregator,
    air_gapped: bool,
    evidence_per_source: usize,
}

/// Orchestrates extraction, evidence search, verification and scoring
pub struct VerificationEngine {
    extractor: ClaimExtractor,
    pipeline: Arc<ClaimPipeline>,
    store: Arc<dyn AnalysisStore>,
    cache: Option<ResultCache>,
    settings: EngineSettings,
}

impl VerificationEngine {
    /// Build an engine from application configuration
    pub fn from_config(
        config: &Config,
        llm: Arc<dyn LanguageModel>,
        sources: Vec<Arc<dyn EvidenceSource>>,
        store: Arc<dyn AnalysisStore>,
        cache: Option<ResultCache>,
    ) -> Self {
        let extractor = ClaimExtractor::new(Arc::clone(&llm), &config.custom_claim_types);
        Self::new(
            extractor,
            llm,
            sources,
            store,
            cache,
            EngineSettings::from(&config.engine),
        )
    }

    pub fn new(
        extractor: ClaimExtractor,
        llm: Arc<dyn LanguageModel>,
        sources: Vec<Arc<dyn EvidenceSource>>,
        store: Arc<dyn AnalysisStore>,
        cache: Option<ResultCache>,
        settings: EngineSettings,
    ) -> Self {
        let aggregator = EvidenceAggregator::new(sources, settings.search_timeout)
            .with_max_total(settings.max_total_evidence);

        // Decided once; sources never come and go at runtime
        let air_gapped = !aggregator.has_sources();
        if air_gapped {
            tracing::warn!("No search sources configured, running in air-gapped mode");
        } else {
            tracing::info!(
                sources = ?aggregator.source_names(),
                max_concurrent_claims = settings.max_concurrent_claims,
                "Verification engine initialized"
            );
        }

        Self {
            extractor,
            pipeline: Arc::new(ClaimPipeline {
                verifier: ClaimVerifier::new(llm),
                aggregator,
                air_gapped,
                evidence_per_source: settings.evidence_per_source,
            }),
            store,
            cache,
            settings,
        }
    }

    pub fn is_air_gapped(&self) -> bool {
        self.pipeline.air_gapped
    }

    /// Verify every claim in `text`, or return the earlier result for the same document
    pub async fn verify_text(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<VerificationResponse, EngineError> {
        let start_time = Instant::now();

        let text = normalize_text(text);
        if text.is_empty() {
            return Err(EngineError::EmptyInput);
        }
        let hash = document_hash(&text);

        if let Some(existing) = self.lookup_existing(&hash).await {
            tracing::info!(id = %existing.id, hash = %hash, "Returning cached analysis");
            return Ok(existing);
        }

        // Cancelled on drop so the run timer never outlives the run
        let run_cancel = cancel.child_token();
        let _run_guard = run_cancel.clone().drop_guard();
        if let Some(run_timeout) = self.settings.run_timeout {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(run_timeout) => {
                        tracing::warn!(timeout_secs = run_timeout.as_secs(), "Verification run timed out");
                        token.cancel();
                    }
                }
            });
        }

        tracing::info!(hash = %hash, "Step 1: Extracting claims");
        let claims = self.extractor.extract(&text, &run_cancel).await?;
        tracing::info!(count = claims.len(), "Claims extracted");

        tracing::info!("Step 2: Verifying claims");
        let (claims, warnings) = self.verify_claims(claims, &run_cancel).await;

        tracing::info!("Step 3: Calculating scores");
        let analysis = build_analysis(hash, &claims, start_time.elapsed());

        let response = VerificationResponse::new(analysis, claims, warnings);

        tracing::info!(
            id = %response.id,
            score = response.analysis.overall_score,
            claims = response.analysis.total_claims,
            warnings = response.warnings.len(),
            duration_ms = response.analysis.processing_time_ms,
            "Verification complete"
        );

        tracing::info!("Step 4: Persisting results");
        self.persist(response.clone());

        Ok(response)
    }

    /// Cache first, then the store; lookup failures count as misses
    async fn lookup_existing(&self, hash: &str) -> Option<VerificationResponse> {
        if let Some(cache) = &self.cache {
            match cache.get_response(hash).await {
                Ok(response) => return Some(response),
                Err(CacheError::Miss(_)) => {}
                Err(e) => tracing::warn!(hash = %hash, error = %e, "Cache lookup failed"),
            }
        }

        let analysis = match self.store.get_analysis_by_hash(hash).await {
            Ok(Some(analysis)) => analysis,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(hash = %hash, error = %e, "Failed to check for existing analysis");
                return None;
            }
        };

        let claims = match self.store.get_claims_by_analysis(&analysis.id).await {
            Ok(claims) => claims,
            Err(e) => {
                tracing::error!(id = %analysis.id, error = %e, "Failed to load claims for existing analysis");
                return None;
            }
        };

        // Claims that never landed make the stored analysis unusable as a result
        if claims.len() != analysis.total_claims {
            tracing::warn!(
                id = %analysis.id,
                expected = analysis.total_claims,
                found = claims.len(),
                "Stored analysis is missing claims, verifying again"
            );
            return None;
        }

        let response = VerificationResponse::new(analysis, claims, Vec::new());

        if let Some(cache) = &self.cache
            && let Err(e) = cache.set_response(&response).await
        {
            tracing::debug!(hash = %hash, error = %e, "Failed to cache response");
        }

        Some(response)
    }

    /// Verify claims concurrently, returning them in extraction order
    async fn verify_claims(
        &self,
        claims: Vec<Claim>,
        cancel: &CancellationToken,
    ) -> (Vec<Claim>, Vec<Warning>) {
        let warnings = Arc::new(Mutex::new(Vec::new()));
        if self.pipeline.air_gapped && !claims.is_empty() {
            warnings.lock().await.push(Warning::new(
                NO_SOURCES_WARNING_SOURCE,
                NO_SOURCES_WARNING_MESSAGE,
            ));
        }

        // Local to this run; concurrent runs do not share the limit
        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_claims));
        let mut tasks = JoinSet::new();

        for (index, claim) in claims.iter().cloned().enumerate() {
            let pipeline = Arc::clone(&self.pipeline);
            let semaphore = Arc::clone(&semaphore);
            let warnings = Arc::clone(&warnings);
            let cancel = cancel.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return (index, claim.resolve(cancelled_outcome(SourceType::ModelBased)));
                    }
                    permit = semaphore.acquire() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (index, claim.resolve(cancelled_outcome(SourceType::ModelBased)));
                        }
                    },
                };
                (index, pipeline.verify_claim(claim, &warnings, &cancel).await)
            });
        }

        let mut slots: Vec<Option<Claim>> = claims.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, claim)) => slots[index] = Some(claim),
                Err(e) => tracing::error!(error = %e, "Claim verification task failed"),
            }
        }

        let claims = slots
            .into_iter()
            .zip(claims)
            .map(|(slot, original)| {
                slot.unwrap_or_else(|| original.resolve(error_outcome(SourceType::ModelBased)))
            })
            .collect();

        let warnings = std::mem::take(&mut *warnings.lock().await);
        (claims, dedup_warnings(warnings))
    }

    /// Save the result without holding up the caller
    fn persist(&self, response: VerificationResponse) {
        let store = Arc::clone(&self.store);
        let cache = self.cache.clone();

        tokio::spawn(async move {
            if let Err(e) = store.save_result(&response.analysis, &response.claims).await {
                tracing::error!(id = %response.id, error = %e, "Failed to save analysis");
            }

            if let Some(cache) = cache
                && let Err(e) = cache.set_response(&response).await
            {
                tracing::debug!(id = %response.id, error = %e, "Failed to cache response");
            }
        });
    }
}

impl ClaimPipeline {
    /// Resolve one claim; never fails
    async fn verify_claim(
        &self,
        claim: Claim,
        warnings: &Mutex<Vec<Warning>>,
        cancel: &CancellationToken,
    ) -> Claim {
        if self.air_gapped {
            let result = self.verifier.verify_with_knowledge(&claim.text, cancel).await;
            let outcome = into_outcome(
                &claim,
                result,
                SourceType::ModelBased,
                Vec::new(),
                VERIFICATION_ERROR_REASONING,
            );
            return claim.resolve(outcome);
        }

        let found = self
            .aggregator
            .search(&claim.text, self.evidence_per_source, cancel)
            .await;
        if !found.warnings.is_empty() {
            warnings.lock().await.extend(found.warnings);
        }

        let outcome = if found.evidences.is_empty() {
            tracing::info!(claim = %claim.preview(), "No evidence found, using model knowledge");
            let result = self.verifier.verify_with_knowledge(&claim.text, cancel).await;
            into_outcome(
                &claim,
                result,
                SourceType::ModelBased,
                Vec::new(),
                NO_EVIDENCE_ERROR_REASONING,
            )
        } else {
            let result = self
                .verifier
                .verify_with_evidence(&claim.text, &found.evidences, cancel)
                .await;
            into_outcome(
                &claim,
                result,
                SourceType::EvidenceBacked,
                found.evidences,
                VERIFICATION_ERROR_REASONING,
            )
        };

        claim.resolve(outcome)
    }
}

fn into_outcome(
    claim: &Claim,
    result: Result<Verdict, VerificationError>,
    source_type: SourceType,
    evidences: Vec<Evidence>,
    error_reasoning: &str,
) -> ClaimOutcome {
    match result {
        Ok(verdict) => ClaimOutcome {
            status: verdict.status,
            confidence: verdict.confidence,
            reasoning: verdict.reasoning,
            source_type,
            evidences,
        },
        Err(VerificationError::Cancelled) => ClaimOutcome {
            evidences,
            ..cancelled_outcome(source_type)
        },
        Err(e) => {
            tracing::error!(claim = %claim.preview(), error = %e, "Verification failed");
            ClaimOutcome {
                reasoning: error_reasoning.to_string(),
                evidences,
                ..error_outcome(source_type)
            }
        }
    }
}

fn error_outcome(source_type: SourceType) -> ClaimOutcome {
    ClaimOutcome {
        status: VerificationStatus::Unsupported,
        confidence: 0.0,
        reasoning: VERIFICATION_ERROR_REASONING.to_string(),
        source_type,
        evidences: Vec::new(),
    }
}

fn cancelled_outcome(source_type: SourceType) -> ClaimOutcome {
    ClaimOutcome {
        status: VerificationStatus::Unsupported,
        confidence: 0.0,
        reasoning: VERIFICATION_CANCELLED_REASONING.to_string(),
        source_type,
        evidences: Vec::new(),
    }
}

/// Keep the first warning per (source, message)
fn dedup_warnings(warnings: Vec<Warning>) -> Vec<Warning> {
    let mut seen = HashSet::new();
    warnings
        .into_iter()
        .filter(|w| seen.insert((w.source.clone(), w.message.clone())))
        .collect()
}

fn build_analysis(document_hash: String, claims: &[Claim], elapsed: Duration) -> AnalysisResult {
    let tally = ClaimTally::from_claims(claims);

    AnalysisResult {
        id: Uuid::new_v4().to_string(),
        document_hash,
        overall_score: tally.score(),
        total_claims: tally.total,
        verified_claims: tally.verified,
        mixed_claims: tally.mixed,
        unsupported_claims: tally.unsupported,
        processing_time_ms: i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX),
        status: ANALYSIS_STATUS_COMPLETED.to_string(),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::llm::ProviderError;
    use crate::service::test_support::{MemoryStore, ScriptedModel, StaticSource};
    use crate::service::verification::KNOWLEDGE_ONLY_DISCLAIMER;
    use crate::service::verification::prompts::EVIDENCE_SYSTEM_PROMPT;

    const VERIFIED: &str =
        r#"{"verification_status": "verified", "confidence_score": 0.9, "reasoning": "Supported."}"#;

    fn claims_json(count: usize) -> String {
        let claims: Vec<String> = (0..count)
            .map(|i| {
                format!(
                    r#"{{"text": "Claim number {} is true", "type": "factual", "sentence_index": {}}}"#,
                    i, i
                )
            })
            .collect();
        format!(r#"{{"claims": [{}]}}"#, claims.join(","))
    }

    fn is_extraction(system: Option<&str>) -> bool {
        system.is_some_and(|s| s.contains("decomposing text into atomic"))
    }

    /// Extraction yields `count` claims; every verification answers `verdict`
    fn scripted(count: usize, verdict: &'static str) -> ScriptedModel {
        let extraction = claims_json(count);
        ScriptedModel::new(move |system, _| {
            if is_extraction(system) {
                Ok(extraction.clone())
            } else {
                Ok(verdict.to_string())
            }
        })
    }

    fn engine(
        model: ScriptedModel,
        sources: Vec<StaticSource>,
        store: Arc<MemoryStore>,
        settings: EngineSettings,
    ) -> VerificationEngine {
        let llm: Arc<dyn LanguageModel> = Arc::new(model);
        let extractor = ClaimExtractor::new(Arc::clone(&llm), &Default::default());
        VerificationEngine::new(
            extractor,
            llm,
            sources
                .into_iter()
                .map(|s| Arc::new(s) as Arc<dyn EvidenceSource>)
                .collect(),
            store,
            None,
            settings,
        )
    }

    #[tokio::test]
    async fn test_empty_input_is_rejected_before_extraction() {
        let model = scripted(1, VERIFIED);
        let calls = model.calls();
        let store = Arc::new(MemoryStore::default());
        let engine = engine(model, vec![], Arc::clone(&store), EngineSettings::default());

        let err = engine
            .verify_text("  \r\n ", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::EmptyInput));
        assert!(calls.lock().unwrap().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.analysis_count(), 0);
    }

    #[tokio::test]
    async fn test_extraction_failure_fails_run() {
        let model = ScriptedModel::new(|_, _| Err(ProviderError::EmptyResponse));
        let store = Arc::new(MemoryStore::default());
        let engine = engine(model, vec![], Arc::clone(&store), EngineSettings::default());

        let err = engine
            .verify_text("Lisbon is the capital of Portugal.", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Extraction(_)));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.analysis_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_cap_is_respected() {
        let model = scripted(20, VERIFIED).with_delay(Duration::from_millis(20));
        let max_in_flight = model.max_in_flight();
        let store = Arc::new(MemoryStore::default());
        let settings = EngineSettings {
            max_concurrent_claims: 5,
            ..EngineSettings::default()
        };
        let engine = engine(model, vec![], store, settings);

        let response = engine
            .verify_text("Twenty facts.", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.claims.len(), 20);
        let indexes: Vec<usize> = response.claims.iter().map(|c| c.sentence_index).collect();
        assert_eq!(indexes, (0..20).collect::<Vec<_>>());
        let observed = max_in_flight.load(Ordering::SeqCst);
        assert!(observed <= 5, "observed {} concurrent calls", observed);
        assert!(observed > 1);
    }

    #[tokio::test]
    async fn test_air_gapped_run_is_model_based() {
        let model = scripted(3, VERIFIED);
        let calls = model.calls();
        let store = Arc::new(MemoryStore::default());
        let offline = StaticSource::returning("Offline", 3).unavailable();
        let searches = offline.searches();
        let engine = engine(model, vec![offline], store, EngineSettings::default());

        assert!(engine.is_air_gapped());
        let response = engine
            .verify_text("Three facts.", &CancellationToken::new())
            .await
            .unwrap();

        assert!(
            response
                .claims
                .iter()
                .all(|c| c.source_type == Some(SourceType::ModelBased))
        );
        assert!(response.claims.iter().all(|c| c.reasoning.ends_with(KNOWLEDGE_ONLY_DISCLAIMER)));
        assert_eq!(
            response.warnings,
            vec![Warning::new(NO_SOURCES_WARNING_SOURCE, NO_SOURCES_WARNING_MESSAGE)]
        );
        assert_eq!(searches.load(Ordering::SeqCst), 0);
        assert!(
            calls
                .lock()
                .unwrap()
                .iter()
                .all(|call| call.system.as_deref() != Some(EVIDENCE_SYSTEM_PROMPT.as_str()))
        );
    }

    #[tokio::test]
    async fn test_empty_evidence_falls_back_to_knowledge() {
        let model = scripted(2, VERIFIED);
        let calls = model.calls();
        let store = Arc::new(MemoryStore::default());
        let engine = engine(
            model,
            vec![StaticSource::returning("Empty", 0)],
            store,
            EngineSettings::default(),
        );

        assert!(!engine.is_air_gapped());
        let response = engine
            .verify_text("Two facts.", &CancellationToken::new())
            .await
            .unwrap();

        assert!(response.warnings.is_empty());
        for claim in &response.claims {
            assert_eq!(claim.source_type, Some(SourceType::ModelBased));
            assert!(claim.evidences.is_empty());
            assert_eq!(claim.status, VerificationStatus::Verified);
        }
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(
            calls
                .iter()
                .all(|call| call.system.as_deref() != Some(EVIDENCE_SYSTEM_PROMPT.as_str()))
        );
    }

    #[tokio::test]
    async fn test_one_source_times_out_across_three_claims() {
        let model = scripted(3, VERIFIED);
        let store = Arc::new(MemoryStore::default());
        let settings = EngineSettings {
            search_timeout: Duration::from_millis(100),
            ..EngineSettings::default()
        };
        let engine = engine(
            model,
            vec![
                StaticSource::returning("Quick", 2),
                StaticSource::returning("Stuck", 2).with_delay(Duration::from_secs(30)),
            ],
            store,
            settings,
        );

        let response = engine
            .verify_text("Three facts.", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.analysis.total_claims, 3);
        assert_eq!(response.claims.len(), 3);
        assert_eq!(response.warnings, vec![Warning::new("Stuck", "timed out after 100ms")]);
        for claim in &response.claims {
            assert_eq!(claim.source_type, Some(SourceType::EvidenceBacked));
            assert_eq!(claim.evidences.len(), 2);
        }
    }

    #[tokio::test]
    async fn test_verification_error_degrades_single_claim() {
        let model = ScriptedModel::new(|system, user| {
            if is_extraction(system) {
                return Ok(claims_json(3));
            }
            if user.contains("Claim number 1 ") {
                return Err(ProviderError::Api {
                    status: 429,
                    message: "rate limited".to_string(),
                });
            }
            Ok(VERIFIED.to_string())
        });
        let store = Arc::new(MemoryStore::default());
        let engine = engine(
            model,
            vec![StaticSource::returning("Web", 1)],
            store,
            EngineSettings::default(),
        );

        let response = engine
            .verify_text("Three facts.", &CancellationToken::new())
            .await
            .unwrap();

        let failed = &response.claims[1];
        assert_eq!(failed.status, VerificationStatus::Unsupported);
        assert_eq!(failed.confidence, 0.0);
        assert_eq!(failed.reasoning, VERIFICATION_ERROR_REASONING);
        assert_eq!(response.claims[0].status, VerificationStatus::Verified);
        assert_eq!(response.claims[2].status, VerificationStatus::Verified);
        assert_eq!(response.analysis.verified_claims, 2);
        assert_eq!(response.analysis.unsupported_claims, 1);
    }

    #[tokio::test]
    async fn test_resubmission_returns_stored_result() {
        let model = scripted(2, VERIFIED);
        let calls = model.calls();
        let store = Arc::new(MemoryStore::default());
        let engine = engine(model, vec![], Arc::clone(&store), EngineSettings::default());

        let first = engine
            .verify_text("Lisbon is the capital.\nPorto is in the north.", &CancellationToken::new())
            .await
            .unwrap();
        store.wait_for_analyses(1).await;
        let calls_after_first = calls.lock().unwrap().len();

        let second = engine
            .verify_text("Lisbon is the capital.\r\nPorto is in the north.\n", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(second.id, first.id);
        assert_eq!(second.document_hash, first.document_hash);
        assert_eq!(second.claims.len(), 2);
        assert!(second.warnings.is_empty());
        assert_eq!(calls.lock().unwrap().len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_store_failures_do_not_fail_run() {
        let model = scripted(1, VERIFIED);
        let store = Arc::new(MemoryStore::failing());
        let engine = engine(model, vec![], Arc::clone(&store), EngineSettings::default());

        let response = engine
            .verify_text("One fact.", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.analysis.total_claims, 1);
        assert_eq!(response.analysis.status, ANALYSIS_STATUS_COMPLETED);
    }

    #[tokio::test]
    async fn test_cancelled_run_degrades_claims() {
        let model = ScriptedModel::new(|system, _| {
            if is_extraction(system) {
                Ok(claims_json(2))
            } else {
                Ok(VERIFIED.to_string())
            }
        });
        let store = Arc::new(MemoryStore::default());
        let settings = EngineSettings {
            run_timeout: Some(Duration::from_millis(50)),
            search_timeout: Duration::from_secs(60),
            ..EngineSettings::default()
        };
        let engine = engine(
            model,
            vec![StaticSource::returning("Stuck", 1).with_delay(Duration::from_secs(30))],
            store,
            settings,
        );

        let started = Instant::now();
        let response = engine
            .verify_text("Two facts.", &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(response.warnings, vec![Warning::new("Stuck", "search cancelled")]);
        for claim in &response.claims {
            assert_eq!(claim.status, VerificationStatus::Unsupported);
            assert_eq!(claim.reasoning, VERIFICATION_CANCELLED_REASONING);
        }
        assert_eq!(response.analysis.overall_score, 0.0);
    }

    #[tokio::test]
    async fn test_analysis_without_claims_is_verified_again() {
        let model = scripted(2, VERIFIED);
        let calls = model.calls();
        let store = Arc::new(MemoryStore::failing_claims());
        let engine = engine(model, vec![], Arc::clone(&store), EngineSettings::default());
        let text = "Lisbon is the capital.\nPorto is in the north.";

        let first = engine
            .verify_text(text, &CancellationToken::new())
            .await
            .unwrap();
        store.wait_for_analyses(1).await;
        let calls_after_first = calls.lock().unwrap().len();

        let second = engine
            .verify_text(text, &CancellationToken::new())
            .await
            .unwrap();

        assert_ne!(second.id, first.id);
        assert_eq!(second.claims.len(), 2);
        assert_eq!(second.analysis.total_claims, 2);
        assert_eq!(calls.lock().unwrap().len(), calls_after_first * 2);
    }

    #[tokio::test]
    async fn test_panicking_claim_keeps_its_slot() {
        let model = ScriptedModel::new(|system, user| {
            if is_extraction(system) {
                return Ok(claims_json(3));
            }
            if user.contains("Claim number 1 ") {
                panic!("model client crashed");
            }
            Ok(VERIFIED.to_string())
        });
        let store = Arc::new(MemoryStore::default());
        let engine = engine(model, vec![], store, EngineSettings::default());

        let response = engine
            .verify_text("Three facts.", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.claims.len(), 3);
        let indexes: Vec<usize> = response.claims.iter().map(|c| c.sentence_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);

        let crashed = &response.claims[1];
        assert_eq!(crashed.text, "Claim number 1 is true");
        assert_eq!(crashed.status, VerificationStatus::Unsupported);
        assert_eq!(crashed.reasoning, VERIFICATION_ERROR_REASONING);
        assert_eq!(crashed.source_type, Some(SourceType::ModelBased));
        assert_eq!(response.claims[0].status, VerificationStatus::Verified);
        assert_eq!(response.claims[2].status, VerificationStatus::Verified);

        let analysis = &response.analysis;
        assert_eq!(analysis.verified_claims, 2);
        assert_eq!(analysis.unsupported_claims, 1);
        assert_eq!(
            analysis.verified_claims + analysis.mixed_claims + analysis.unsupported_claims,
            analysis.total_claims
        );
    }

    #[tokio::test]
    async fn test_claims_waiting_for_a_permit_are_cancelled_in_order() {
        let model = scripted(6, VERIFIED);
        let store = Arc::new(MemoryStore::default());
        let settings = EngineSettings {
            max_concurrent_claims: 2,
            run_timeout: Some(Duration::from_millis(50)),
            search_timeout: Duration::from_secs(60),
            ..EngineSettings::default()
        };
        let stuck = StaticSource::returning("Stuck", 1).with_delay(Duration::from_secs(30));
        let searches = stuck.searches();
        let engine = engine(model, vec![stuck], store, settings);

        let started = Instant::now();
        let response = engine
            .verify_text("Six facts.", &CancellationToken::new())
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(10));
        // Only the claims holding a permit ever reached the source
        assert_eq!(searches.load(Ordering::SeqCst), 2);
        assert_eq!(response.claims.len(), 6);
        let indexes: Vec<usize> = response.claims.iter().map(|c| c.sentence_index).collect();
        assert_eq!(indexes, (0..6).collect::<Vec<_>>());
        for claim in &response.claims {
            assert_eq!(claim.status, VerificationStatus::Unsupported);
            assert_eq!(claim.confidence, 0.0);
            assert_eq!(claim.reasoning, VERIFICATION_CANCELLED_REASONING);
        }
        assert_eq!(response.analysis.unsupported_claims, 6);
    }

    #[tokio::test]
    async fn test_failed_fallback_records_missing_evidence() {
        let model = ScriptedModel::new(|system, _| {
            if is_extraction(system) {
                Ok(claims_json(1))
            } else {
                Err(ProviderError::EmptyResponse)
            }
        });
        let store = Arc::new(MemoryStore::default());
        let engine = engine(
            model,
            vec![StaticSource::returning("Empty", 0)],
            store,
            EngineSettings::default(),
        );

        let response = engine
            .verify_text("One fact.", &CancellationToken::new())
            .await
            .unwrap();

        let claim = &response.claims[0];
        assert_eq!(claim.status, VerificationStatus::Unsupported);
        assert_eq!(claim.reasoning, NO_EVIDENCE_ERROR_REASONING);
        assert_eq!(claim.source_type, Some(SourceType::ModelBased));
    }

    #[test]
    fn test_dedup_warnings() {
        let warnings = vec![
            Warning::new("PubMed", "timed out after 15s"),
            Warning::new("DuckDuckGo", "search failed: 503"),
            Warning::new("PubMed", "timed out after 15s"),
        ];
        assert_eq!(dedup_warnings(warnings).len(), 2);
    }

    #[test]
    fn test_build_analysis_invariants() {
        let mut claims = vec![
            Claim::pending("a", crate::model::ClaimType::Factual, 0),
            Claim::pending("b", crate::model::ClaimType::Factual, 1),
        ];
        claims[0].status = VerificationStatus::Verified;
        claims[1].status = VerificationStatus::Mixed;

        let analysis = build_analysis("hash".to_string(), &claims, Duration::from_millis(12));

        assert_eq!(analysis.total_claims, 2);
        assert_eq!(
            analysis.verified_claims + analysis.mixed_claims + analysis.unsupported_claims,
            analysis.total_claims
        );
        assert_eq!(analysis.overall_score, 7.5);
        assert_eq!(analysis.processing_time_ms, 12);
    }
}
