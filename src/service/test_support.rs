//! Hand-written capability doubles shared by service tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::db::{AnalysisStore, StoreError};
use crate::llm::{CompletionOptions, LanguageModel, ProviderError};
use crate::model::{AnalysisResult, Claim, Evidence, EvidenceSourceType};
use crate::search::{EvidenceSource, SearchError};

type Responder = dyn Fn(Option<&str>, &str) -> Result<String, ProviderError> + Send + Sync;

/// One recorded `complete` call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: Option<String>,
    pub user: String,
    pub options: CompletionOptions,
}

/// Language model answering from a closure, recording every call
pub struct ScriptedModel {
    responder: Box<Responder>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(Option<&str>, &str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<RecordedCall>>> {
        Arc::clone(&self.calls)
    }

    /// Highest number of simultaneous `complete` calls observed
    pub fn max_in_flight(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_in_flight)
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system: system.map(str::to_string),
            user: user.to_string(),
            options: options.clone(),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        (self.responder)(system, user)
    }
}

/// Evidence source returning canned snippets, optionally slow or failing
pub struct StaticSource {
    name: String,
    count: usize,
    delay: Option<Duration>,
    fail: bool,
    available: bool,
    searches: Arc<AtomicUsize>,
}

impl StaticSource {
    pub fn returning(name: &str, count: usize) -> Self {
        Self {
            name: name.to_string(),
            count,
            delay: None,
            fail: false,
            available: true,
            searches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::returning(name, 0)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn searches(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.searches)
    }
}

#[async_trait]
impl EvidenceSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<Evidence>, SearchError> {
        self.searches.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(SearchError::Status(503));
        }

        // Deliberately ignores `max_results` so callers must enforce it
        let _ = max_results;
        Ok((0..self.count)
            .map(|i| {
                Evidence::new(
                    self.name.clone(),
                    format!("https://{}.example/{}", self.name.to_lowercase(), i),
                    EvidenceSourceType::WebPage,
                    format!("{} result {} for {}", self.name, i, query),
                )
            })
            .collect())
    }
}

/// In-memory analysis store
#[derive(Default)]
pub struct MemoryStore {
    analyses: Mutex<Vec<AnalysisResult>>,
    claims: Mutex<HashMap<String, Vec<Claim>>>,
    fail_reads: bool,
    fail_writes: bool,
    fail_claim_writes: bool,
}

impl MemoryStore {
    /// A store whose every read and write fails
    pub fn failing() -> Self {
        Self {
            fail_reads: true,
            fail_writes: true,
            ..Self::default()
        }
    }

    /// A store that saves analyses but loses their claims
    pub fn failing_claims() -> Self {
        Self {
            fail_claim_writes: true,
            ..Self::default()
        }
    }

    pub fn analysis_count(&self) -> usize {
        self.analyses.lock().unwrap().len()
    }

    /// Wait for a detached save to land
    pub async fn wait_for_analyses(&self, count: usize) {
        for _ in 0..200 {
            if self.analysis_count() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("store never reached {} analyses", count);
    }
}

fn unavailable() -> StoreError {
    StoreError::Serialization("store unavailable".to_string())
}

#[async_trait]
impl AnalysisStore for MemoryStore {
    async fn get_analysis_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<AnalysisResult>, StoreError> {
        if self.fail_reads {
            return Err(unavailable());
        }
        Ok(self
            .analyses
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.document_hash == hash)
            .cloned())
    }

    async fn save_analysis(&self, result: &AnalysisResult) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(unavailable());
        }
        let mut analyses = self.analyses.lock().unwrap();
        analyses.retain(|a| a.document_hash != result.document_hash);
        analyses.push(result.clone());
        Ok(())
    }

    async fn save_claims(&self, analysis_id: &str, claims: &[Claim]) -> Result<(), StoreError> {
        if self.fail_writes || self.fail_claim_writes {
            return Err(unavailable());
        }
        self.claims
            .lock()
            .unwrap()
            .insert(analysis_id.to_string(), claims.to_vec());
        Ok(())
    }

    async fn get_analysis(&self, id: &str) -> Result<AnalysisResult, StoreError> {
        if self.fail_reads {
            return Err(unavailable());
        }
        self.analyses
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn get_claims_by_analysis(&self, analysis_id: &str) -> Result<Vec<Claim>, StoreError> {
        if self.fail_reads {
            return Err(unavailable());
        }
        Ok(self
            .claims
            .lock()
            .unwrap()
            .get(analysis_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_analyses(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AnalysisResult>, StoreError> {
        if self.fail_reads {
            return Err(unavailable());
        }
        let mut analyses = self.analyses.lock().unwrap().clone();
        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(analyses
            .into_iter()
            .skip(usize::try_from(offset.max(0)).unwrap_or_default())
            .take(usize::try_from(limit.clamp(1, 100)).unwrap_or_default())
            .collect())
    }
}
