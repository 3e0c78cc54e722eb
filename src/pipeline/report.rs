//! Report assembly: summary statistics plus the ordered record list.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::results_url;
use crate::domain::TrialRecord;
use crate::error::Result;
use crate::pipeline::literature::LiteratureSummary;
use crate::pipeline::processing::enrich::{EnrichmentOutcome, OutcomeStatus};
use crate::pipeline::processing::select::{DropReason, RankKey};

pub const DEFAULT_HEADLINE_COUNT: usize = 5;

/// A failed or skipped id with its reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeIssue {
    pub id: String,
    pub reason: String,
}

/// A source page that could not be fetched; the run continued without it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceError {
    pub source_id: String,
    pub page: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub enriched: usize,
    pub with_detail: usize,
    pub with_outcome_data: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Mean over every outcome, failed and skipped records included
    pub average_enrollment: f64,
    pub phases: BTreeSet<String>,
    pub failures: Vec<OutcomeIssue>,
    pub skipped_records: Vec<OutcomeIssue>,
    pub dropped_by_selection: BTreeMap<String, usize>,
    pub literature: Option<LiteratureSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    /// 1-based position in selection order
    pub rank: usize,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
    pub results_url: String,
    pub record: TrialRecord,
}

/// The single object handed to sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    /// Ids of the top records by rank key
    pub headline: Vec<String>,
    pub records: Vec<ReportEntry>,
    pub source_errors: Vec<SourceError>,
}

impl Report {
    /// Self-describing ordered mapping (field name to value) for sinks
    pub fn to_ordered_map(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            // A struct always serializes to an object
            other => {
                let mut map = Map::new();
                map.insert("report".to_string(), other);
                Ok(map)
            }
        }
    }

    pub fn entry(&self, id: &str) -> Option<&ReportEntry> {
        self.records.iter().find(|e| e.record.id == id)
    }
}

/// Run-level information that does not come from the outcomes themselves
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub dropped_by_selection: BTreeMap<DropReason, usize>,
    pub literature: Option<LiteratureSummary>,
    pub source_errors: Vec<SourceError>,
}

#[derive(Debug, Clone)]
pub struct ReportAssembler {
    headline_count: usize,
    rank_key: RankKey,
}

impl Default for ReportAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_HEADLINE_COUNT, RankKey::default())
    }
}

impl ReportAssembler {
    pub fn new(headline_count: usize, rank_key: RankKey) -> Self {
        Self {
            headline_count,
            rank_key,
        }
    }

    pub fn assemble(&self, outcomes: Vec<EnrichmentOutcome>) -> Report {
        self.assemble_with(outcomes, ReportContext::default())
    }

    /// Outcomes keep their order; every outcome becomes exactly one entry.
    pub fn assemble_with(&self, outcomes: Vec<EnrichmentOutcome>, context: ReportContext) -> Report {
        let total = outcomes.len();
        let mut failures = Vec::new();
        let mut skipped_records = Vec::new();
        let mut phases = BTreeSet::new();
        let mut enrollment_sum: u128 = 0;
        let mut with_detail = 0;
        let mut with_outcome_data = 0;

        let records: Vec<ReportEntry> = outcomes
            .into_iter()
            .enumerate()
            .map(|(position, outcome)| {
                let status = outcome.status();
                let reason = outcome.reason();
                match status {
                    OutcomeStatus::Failed => failures.push(OutcomeIssue {
                        id: outcome.id().to_string(),
                        reason: reason.clone().unwrap_or_default(),
                    }),
                    OutcomeStatus::Skipped => skipped_records.push(OutcomeIssue {
                        id: outcome.id().to_string(),
                        reason: reason.clone().unwrap_or_default(),
                    }),
                    OutcomeStatus::Enriched => {}
                }

                let record = outcome.into_record();
                enrollment_sum += u128::from(record.enrollment_count);
                if !record.phase.is_empty() {
                    phases.insert(record.phase.clone());
                }
                if let Some(detail) = &record.detail {
                    with_detail += 1;
                    if detail.has_outcome_data() {
                        with_outcome_data += 1;
                    }
                }

                ReportEntry {
                    rank: position + 1,
                    status,
                    reason,
                    results_url: results_url(&record.id),
                    record,
                }
            })
            .collect();

        let average_enrollment = if total == 0 {
            0.0
        } else {
            enrollment_sum as f64 / total as f64
        };

        let mut ranked: Vec<&TrialRecord> = records.iter().map(|e| &e.record).collect();
        ranked.sort_by(|a, b| self.rank_key.compare(a, b));
        let headline = ranked
            .into_iter()
            .take(self.headline_count)
            .map(|r| r.id.clone())
            .collect();

        let summary = ReportSummary {
            total,
            enriched: total - failures.len() - skipped_records.len(),
            with_detail,
            with_outcome_data,
            failed: failures.len(),
            skipped: skipped_records.len(),
            average_enrollment,
            phases,
            failures,
            skipped_records,
            dropped_by_selection: context
                .dropped_by_selection
                .into_iter()
                .map(|(reason, count)| (reason.to_string(), count))
                .collect(),
            literature: context.literature,
        };

        Report {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            summary,
            headline,
            records,
            source_errors: context.source_errors,
        }
    }
}

/// Assemble with the default headline size and rank key
pub fn assemble(outcomes: Vec<EnrichmentOutcome>) -> Report {
    ReportAssembler::default().assemble(outcomes)
}
