use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::app::ports::RegistryDetailPort;
use crate::domain::{TrialDetail, TrialRecord};
use crate::error::FetchError;
use crate::pipeline::cancel::CancelSignal;
use crate::pipeline::processing::normalize::TrialNormalizer;
use crate::pipeline::processing::select::SelectionResult;

/// Reason recorded for records whose lookup was cancelled
pub const CANCELLED_REASON: &str = "cancelled";

/// Concurrency, timeout and retry settings for detail lookups
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichOptions {
    /// Maximum simultaneous detail lookups
    pub concurrency_limit: usize,
    /// A call running longer than this is cancelled and counts as an attempt
    pub per_call_timeout: Duration,
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: 3,
            per_call_timeout: Duration::from_secs(15),
            max_retries: 2,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(8),
        }
    }
}

impl EnrichOptions {
    /// Exponential backoff before retry number `attempt` (1-based), with up to 10% jitter
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max);
        let jitter_ms = (delay.as_millis() / 10) as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Result of the detail stage for one selected record.
///
/// Skipped and failed outcomes keep the pre-enrichment record.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichmentOutcome {
    Enriched {
        record: TrialRecord,
        attempts: u32,
    },
    Skipped {
        id: String,
        reason: String,
        record: TrialRecord,
    },
    Failed {
        id: String,
        error: FetchError,
        attempts: u32,
        record: TrialRecord,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Enriched,
    Skipped,
    Failed,
}

impl EnrichmentOutcome {
    fn skipped(record: TrialRecord, reason: &str) -> Self {
        EnrichmentOutcome::Skipped {
            id: record.id.clone(),
            reason: reason.to_string(),
            record,
        }
    }

    fn failed(record: TrialRecord, error: FetchError, attempts: u32) -> Self {
        EnrichmentOutcome::Failed {
            id: record.id.clone(),
            error,
            attempts,
            record,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            EnrichmentOutcome::Enriched { record, .. } => &record.id,
            EnrichmentOutcome::Skipped { id, .. } | EnrichmentOutcome::Failed { id, .. } => id,
        }
    }

    pub fn record(&self) -> &TrialRecord {
        match self {
            EnrichmentOutcome::Enriched { record, .. }
            | EnrichmentOutcome::Skipped { record, .. }
            | EnrichmentOutcome::Failed { record, .. } => record,
        }
    }

    pub fn into_record(self) -> TrialRecord {
        match self {
            EnrichmentOutcome::Enriched { record, .. }
            | EnrichmentOutcome::Skipped { record, .. }
            | EnrichmentOutcome::Failed { record, .. } => record,
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        match self {
            EnrichmentOutcome::Enriched { .. } => OutcomeStatus::Enriched,
            EnrichmentOutcome::Skipped { .. } => OutcomeStatus::Skipped,
            EnrichmentOutcome::Failed { .. } => OutcomeStatus::Failed,
        }
    }

    /// Skip or failure reason; `None` for enriched records
    pub fn reason(&self) -> Option<String> {
        match self {
            EnrichmentOutcome::Enriched { .. } => None,
            EnrichmentOutcome::Skipped { reason, .. } => Some(reason.clone()),
            EnrichmentOutcome::Failed { error, .. } => Some(error.to_string()),
        }
    }
}

/// Add detail structure to a record. Normalized top-level fields are
/// authoritative and stay untouched even when the detail payload disagrees.
pub fn merge_detail(mut record: TrialRecord, detail: TrialDetail) -> TrialRecord {
    record.detail = Some(detail);
    record
}

/// Fans detail lookups out over a bounded worker pool and fans the outcomes
/// back in, in selection order.
pub struct Enricher {
    detail: Arc<dyn RegistryDetailPort>,
    normalizer: Arc<TrialNormalizer>,
    options: EnrichOptions,
}

impl Enricher {
    pub fn new(detail: Arc<dyn RegistryDetailPort>, options: EnrichOptions) -> Self {
        Self {
            detail,
            normalizer: Arc::new(TrialNormalizer::new()),
            options,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<TrialNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Enrich every selected record. Exactly one outcome per input record,
    /// in input order, regardless of completion order.
    pub async fn enrich(&self, selection: SelectionResult, cancel: CancelSignal) -> Vec<EnrichmentOutcome> {
        let total = selection.records.len();
        let permits = self.options.concurrency_limit.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));
        let mut tasks = JoinSet::new();
        // Each worker owns one slot, addressed by its position in the selection
        let mut slots: Vec<Option<EnrichmentOutcome>> = vec![None; total];
        let originals = selection.records.clone();

        info!(
            records = total,
            concurrency = self.options.concurrency_limit,
            "Starting detail enrichment"
        );

        for (index, record) in selection.records.into_iter().enumerate() {
            if cancel.is_cancelled() {
                slots[index] = Some(EnrichmentOutcome::skipped(record, CANCELLED_REASON));
                continue;
            }
            let lookup = DetailLookup {
                detail: Arc::clone(&self.detail),
                normalizer: Arc::clone(&self.normalizer),
                options: self.options.clone(),
                semaphore: Arc::clone(&semaphore),
            };
            let mut cancel = cancel.clone();

            tasks.spawn(async move {
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    result = lookup.run(&record.id) => Some(result),
                };
                let outcome = match result {
                    None => EnrichmentOutcome::skipped(record, CANCELLED_REASON),
                    Some(Ok((detail, attempts))) => EnrichmentOutcome::Enriched {
                        record: merge_detail(record, detail),
                        attempts,
                    },
                    Some(Err((error, attempts))) => {
                        warn!(id = %record.id, attempts, error = %error, "Detail lookup failed");
                        EnrichmentOutcome::failed(record, error, attempts)
                    }
                };
                (index, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => warn!(error = %e, "Enrichment worker aborted"),
            }
        }

        let outcomes: Vec<EnrichmentOutcome> = slots
            .into_iter()
            .zip(originals)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| {
                    EnrichmentOutcome::failed(record, FetchError::permanent("worker aborted"), 0)
                })
            })
            .collect();

        let enriched = outcomes
            .iter()
            .filter(|o| o.status() == OutcomeStatus::Enriched)
            .count();
        info!(
            records = total,
            enriched,
            unresolved = total - enriched,
            "Detail enrichment complete"
        );
        outcomes
    }
}

/// Everything one worker needs; cheap to clone per record
struct DetailLookup {
    detail: Arc<dyn RegistryDetailPort>,
    normalizer: Arc<TrialNormalizer>,
    options: EnrichOptions,
    semaphore: Arc<Semaphore>,
}

impl DetailLookup {
    async fn run(&self, id: &str) -> Result<(TrialDetail, u32), (FetchError, u32)> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| (FetchError::permanent("worker pool closed"), 0))?;

        let mut attempts = 0u32;
        loop {
            attempts += 1;
            match self.attempt(id).await {
                Ok(detail) => return Ok((detail, attempts)),
                Err(error) if error.is_transient() && attempts <= self.options.max_retries => {
                    let delay = self.options.backoff_delay(attempts);
                    debug!(id, attempts, error = %error, delay_ms = delay.as_millis() as u64, "Retrying detail lookup");
                    tokio::time::sleep(delay).await;
                }
                Err(error) => return Err((error, attempts)),
            }
        }
    }

    async fn attempt(&self, id: &str) -> Result<TrialDetail, FetchError> {
        let document = tokio::time::timeout(self.options.per_call_timeout, self.detail.fetch_detail(id))
            .await
            .map_err(|_| FetchError::Timeout)??;
        self.normalizer
            .extract_detail(&document)
            .ok_or_else(|| FetchError::permanent("malformed detail response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DetailDocument, QualityFlags, SchemaVersion};
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn record(id: &str, enrollment: u64) -> TrialRecord {
        TrialRecord {
            id: id.to_string(),
            title: Some(format!("Trial {}", id)),
            official_title: None,
            conditions: Vec::new(),
            interventions: vec!["Drug".to_string()],
            primary_outcomes: Vec::new(),
            secondary_outcomes: Vec::new(),
            phase: "Phase 3".to_string(),
            overall_status: "Completed".to_string(),
            enrollment_count: enrollment,
            enrollment_reported: true,
            start_date: String::new(),
            completion_date: String::new(),
            results_posted_date: String::new(),
            has_results: true,
            detail: None,
            quality: QualityFlags::default(),
            source_schema: SchemaVersion::V2Structured,
            collected_at: Utc::now(),
        }
    }

    fn selection(ids: &[&str]) -> SelectionResult {
        SelectionResult {
            records: ids.iter().map(|id| record(id, 100)).collect(),
            dropped: Vec::new(),
        }
    }

    fn detail_doc(id: &str) -> DetailDocument {
        DetailDocument {
            schema_version: SchemaVersion::V2Structured,
            payload: json!({
                "protocolSection": {
                    "identificationModule": {"nctId": id, "briefTitle": "Detail title disagrees"},
                    "designModule": {"enrollmentInfo": {"count": 1}}
                }
            }),
        }
    }

    enum Behaviour {
        Ok,
        Permanent,
        TransientTimes(u32),
        Hang,
    }

    struct StubDetail {
        behaviour: HashMap<String, Behaviour>,
        calls: Mutex<HashMap<String, u32>>,
    }

    impl StubDetail {
        fn new(behaviour: Vec<(&str, Behaviour)>) -> Self {
            Self {
                behaviour: behaviour.into_iter().map(|(id, b)| (id.to_string(), b)).collect(),
                calls: Mutex::new(HashMap::new()),
            }
        }

        fn calls(&self, id: &str) -> u32 {
            *self.calls.lock().unwrap().get(id).unwrap_or(&0)
        }
    }

    #[async_trait]
    impl RegistryDetailPort for StubDetail {
        async fn fetch_detail(&self, id: &str) -> Result<DetailDocument, FetchError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                let count = calls.entry(id.to_string()).or_insert(0);
                *count += 1;
                *count
            };
            match self.behaviour.get(id).unwrap_or(&Behaviour::Ok) {
                Behaviour::Ok => Ok(detail_doc(id)),
                Behaviour::Permanent => Err(FetchError::permanent("HTTP 404")),
                Behaviour::TransientTimes(n) if call <= *n => Err(FetchError::transient("HTTP 503")),
                Behaviour::TransientTimes(_) => Ok(detail_doc(id)),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(detail_doc(id))
                }
            }
        }
    }

    fn fast_options(concurrency_limit: usize) -> EnrichOptions {
        EnrichOptions {
            concurrency_limit,
            per_call_timeout: Duration::from_secs(5),
            max_retries: 2,
            backoff_base: Duration::from_millis(10),
            backoff_max: Duration::from_millis(100),
        }
    }

    #[tokio::test]
    async fn test_merge_keeps_normalized_fields() {
        let stub = Arc::new(StubDetail::new(vec![]));
        let enricher = Enricher::new(stub, fast_options(2));

        let outcomes = enricher.enrich(selection(&["NCT1"]), CancelSignal::never()).await;
        match &outcomes[0] {
            EnrichmentOutcome::Enriched { record, attempts } => {
                assert_eq!(*attempts, 1);
                assert_eq!(record.title.as_deref(), Some("Trial NCT1"));
                assert_eq!(record.enrollment_count, 100);
                assert!(record.is_detail_complete());
            }
            other => panic!("expected enriched outcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_is_isolated_and_not_retried() {
        let stub = Arc::new(StubDetail::new(vec![("C", Behaviour::Permanent)]));
        let enricher = Enricher::new(stub.clone(), fast_options(2));

        let outcomes = enricher
            .enrich(selection(&["A", "B", "C", "D", "E"]), CancelSignal::never())
            .await;

        assert_eq!(outcomes.len(), 5);
        let ids: Vec<&str> = outcomes.iter().map(|o| o.id()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D", "E"]);
        assert_eq!(outcomes[2].status(), OutcomeStatus::Failed);
        assert!(outcomes[2].reason().unwrap().starts_with("permanent"));
        assert_eq!(stub.calls("C"), 1);
        assert_eq!(
            outcomes.iter().filter(|o| o.status() == OutcomeStatus::Enriched).count(),
            4
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let stub = Arc::new(StubDetail::new(vec![("A", Behaviour::TransientTimes(2))]));
        let enricher = Enricher::new(stub.clone(), fast_options(1));

        let outcomes = enricher.enrich(selection(&["A"]), CancelSignal::never()).await;
        assert_eq!(outcomes[0].status(), OutcomeStatus::Enriched);
        assert_eq!(stub.calls("A"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let stub = Arc::new(StubDetail::new(vec![("A", Behaviour::TransientTimes(10))]));
        let enricher = Enricher::new(stub.clone(), fast_options(1));

        let outcomes = enricher.enrich(selection(&["A"]), CancelSignal::never()).await;
        match &outcomes[0] {
            EnrichmentOutcome::Failed { error, attempts, record, .. } => {
                assert!(error.is_transient());
                assert_eq!(*attempts, 3);
                assert!(record.detail.is_none());
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(stub.calls("A"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_count_as_attempts() {
        let stub = Arc::new(StubDetail::new(vec![("SLOW", Behaviour::Hang)]));
        let enricher = Enricher::new(stub.clone(), fast_options(2));

        let outcomes = enricher
            .enrich(selection(&["SLOW", "FAST"]), CancelSignal::never())
            .await;
        assert_eq!(outcomes[0].reason().as_deref(), Some("transient: call timed out"));
        assert_eq!(stub.calls("SLOW"), 3);
        assert_eq!(outcomes[1].status(), OutcomeStatus::Enriched);
    }

    #[tokio::test]
    async fn test_malformed_detail_is_permanent() {
        struct Malformed;

        #[async_trait]
        impl RegistryDetailPort for Malformed {
            async fn fetch_detail(&self, _id: &str) -> Result<DetailDocument, FetchError> {
                Ok(DetailDocument {
                    schema_version: SchemaVersion::V2Structured,
                    payload: json!({"unexpected": true}),
                })
            }
        }

        let enricher = Enricher::new(Arc::new(Malformed), fast_options(1));
        let outcomes = enricher.enrich(selection(&["A"]), CancelSignal::never()).await;
        assert_eq!(
            outcomes[0].reason().as_deref(),
            Some("permanent: malformed detail response")
        );
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        struct Counting {
            active: AtomicU32,
            peak: AtomicU32,
        }

        #[async_trait]
        impl RegistryDetailPort for Counting {
            async fn fetch_detail(&self, id: &str) -> Result<DetailDocument, FetchError> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(detail_doc(id))
            }
        }

        let stub = Arc::new(Counting {
            active: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        });
        let enricher = Enricher::new(stub.clone(), fast_options(2));
        let outcomes = enricher
            .enrich(selection(&["A", "B", "C", "D", "E", "F"]), CancelSignal::never())
            .await;

        assert_eq!(outcomes.len(), 6);
        assert!(stub.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let (handle, signal) = CancelSignal::new();
        handle.cancel();
        let enricher = Enricher::new(Arc::new(StubDetail::new(vec![])), fast_options(2));

        let outcomes = enricher.enrich(selection(&["A", "B"]), signal).await;
        for outcome in &outcomes {
            assert_eq!(outcome.status(), OutcomeStatus::Skipped);
            assert_eq!(outcome.reason().as_deref(), Some(CANCELLED_REASON));
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let options = EnrichOptions {
            backoff_base: Duration::from_millis(100),
            backoff_max: Duration::from_millis(1000),
            ..EnrichOptions::default()
        };
        let first = options.backoff_delay(1);
        let second = options.backoff_delay(2);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));
        assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(220));
        assert!(options.backoff_delay(30) <= Duration::from_millis(1100));
    }
}
