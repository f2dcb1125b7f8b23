//! Evidence aggregation across all configured sources
//!
//! Each source is queried in its own task. Collection stops when every source
//! has answered, when the search timeout elapses, or when the caller cancels;
//! whatever is still outstanding at that point becomes a warning.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::model::{Evidence, Warning};
use crate::search::{EvidenceSource, SearchError};

/// Warning source used when no evidence source exists at all
pub const NO_SOURCES_WARNING_SOURCE: &str = "search";
pub const NO_SOURCES_WARNING_MESSAGE: &str = "No search sources configured";

/// Evidence and warnings collected for one query
#[derive(Debug, Default)]
pub struct AggregatedEvidence {
    pub evidences: Vec<Evidence>,
    pub warnings: Vec<Warning>,
}

/// Outcome of one source for one query
enum SourceOutcome {
    Found(Vec<Evidence>),
    Failed(SearchError),
}

/// Why collection stopped before all sources answered
#[derive(Clone, Copy)]
enum Interruption {
    TimedOut,
    Cancelled,
}

/// Fans a query out to every source in parallel and merges the results
pub struct EvidenceAggregator {
    sources: Vec<Arc<dyn EvidenceSource>>,
    timeout: Duration,
    max_total: Option<usize>,
}

impl EvidenceAggregator {
    /// Sources reporting themselves unavailable are dropped here, once
    pub fn new(sources: Vec<Arc<dyn EvidenceSource>>, timeout: Duration) -> Self {
        let sources: Vec<_> = sources
            .into_iter()
            .filter(|source| {
                let available = source.is_available();
                if !available {
                    tracing::info!(source = source.name(), "Evidence source unavailable, skipping");
                }
                available
            })
            .collect();

        Self {
            sources,
            timeout,
            max_total: None,
        }
    }

    /// Cap the merged evidence list
    pub fn with_max_total(mut self, max_total: Option<usize>) -> Self {
        self.max_total = max_total;
        self
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Search every source for `query`, taking at most `per_source_limit` from each.
    ///
    /// Never fails: source errors, timeouts and cancellation become warnings.
    pub async fn search(
        &self,
        query: &str,
        per_source_limit: usize,
        cancel: &CancellationToken,
    ) -> AggregatedEvidence {
        if self.sources.is_empty() {
            return AggregatedEvidence {
                evidences: Vec::new(),
                warnings: vec![Warning::new(
                    NO_SOURCES_WARNING_SOURCE,
                    NO_SOURCES_WARNING_MESSAGE,
                )],
            };
        }

        let mut tasks = JoinSet::new();
        for (index, source) in self.sources.iter().enumerate() {
            let source = Arc::clone(source);
            let query = query.to_string();
            tasks.spawn(async move {
                let outcome = match source.search(&query, per_source_limit).await {
                    Ok(found) => SourceOutcome::Found(found),
                    Err(e) => SourceOutcome::Failed(e),
                };
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<SourceOutcome>> =
            self.sources.iter().map(|_| None).collect();
        let mut interruption = None;

        let deadline = tokio::time::sleep(self.timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    interruption = Some(Interruption::Cancelled);
                    break;
                }
                _ = &mut deadline => {
                    interruption = Some(Interruption::TimedOut);
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, outcome))) => outcomes[index] = Some(outcome),
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Evidence search task failed");
                    }
                    None => break,
                },
            }
        }

        tasks.abort_all();

        let mut warnings = Vec::new();
        let mut merged = Vec::new();

        for (source, outcome) in self.sources.iter().zip(outcomes) {
            match outcome {
                Some(SourceOutcome::Found(found)) => {
                    tracing::debug!(source = source.name(), count = found.len(), "Evidence source answered");
                    merged.extend(found.into_iter().take(per_source_limit));
                }
                Some(SourceOutcome::Failed(e)) => {
                    tracing::warn!(source = source.name(), error = %e, "Evidence source failed");
                    warnings.push(Warning::new(source.name(), format!("search failed: {}", e)));
                }
                None => {
                    let message = match interruption {
                        Some(Interruption::TimedOut) => {
                            format!("timed out after {}", format_duration(self.timeout))
                        }
                        Some(Interruption::Cancelled) => "search cancelled".to_string(),
                        None => "search task failed".to_string(),
                    };
                    tracing::warn!(source = source.name(), reason = %message, "Evidence source did not answer");
                    warnings.push(Warning::new(source.name(), message));
                }
            }
        }

        let mut evidences = dedup_evidence(merged);
        if let Some(max_total) = self.max_total {
            evidences.truncate(max_total);
        }

        AggregatedEvidence {
            evidences,
            warnings,
        }
    }
}

/// Drop empty snippets and keep the first evidence per source URL
fn dedup_evidence(evidences: Vec<Evidence>) -> Vec<Evidence> {
    let mut seen = HashSet::new();
    evidences
        .into_iter()
        .filter(|e| !e.snippet.trim().is_empty())
        .filter(|e| e.source_url.is_empty() || seen.insert(e.source_url.clone()))
        .collect()
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
