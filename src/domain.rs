//! Canonical data shapes shared by every pipeline stage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{SCHEMA_PUBMED, SCHEMA_V1_FIELDS, SCHEMA_V2_STRUCTURED};
use crate::error::ConfigError;

/// Shape of a raw registry payload. Selects the field mapping used to read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    /// Legacy registry API: every field is an array of strings
    #[serde(rename = "v1_fields")]
    V1Fields,
    /// Current registry API: nested module objects with typed values
    #[serde(rename = "v2_structured")]
    V2Structured,
    /// Literature search API
    #[serde(rename = "pubmed")]
    Pubmed,
}

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1Fields => SCHEMA_V1_FIELDS,
            SchemaVersion::V2Structured => SCHEMA_V2_STRUCTURED,
            SchemaVersion::Pubmed => SCHEMA_PUBMED,
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            SCHEMA_V1_FIELDS => Ok(SchemaVersion::V1Fields),
            SCHEMA_V2_STRUCTURED => Ok(SchemaVersion::V2Structured),
            SCHEMA_PUBMED => Ok(SchemaVersion::Pubmed),
            other => Err(ConfigError::SchemaVersion(other.to_string())),
        }
    }
}

/// One raw payload returned by a source call, consumed once by the normalizer
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub schema_version: SchemaVersion,
    /// Source that produced the payload (e.g. "clinicaltrials_v2")
    pub source_id: String,
    pub payload: Value,
}

impl SourceDocument {
    pub fn new(schema_version: SchemaVersion, source_id: impl Into<String>, payload: Value) -> Self {
        Self {
            schema_version,
            source_id: source_id.into(),
            payload,
        }
    }
}

/// Raw per-trial detail payload (protocol and results sections)
#[derive(Debug, Clone)]
pub struct DetailDocument {
    pub schema_version: SchemaVersion,
    pub payload: Value,
}

/// Canonical trial record, one per registered trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    /// Registry identifier (e.g. "NCT01234567"); the sole dedup key
    pub id: String,
    pub title: Option<String>,
    pub official_title: Option<String>,
    pub conditions: Vec<String>,
    pub interventions: Vec<String>,
    pub primary_outcomes: Vec<String>,
    pub secondary_outcomes: Vec<String>,
    pub phase: String,
    pub overall_status: String,
    /// 0 when unknown; see `enrollment_reported`
    pub enrollment_count: u64,
    /// Whether the source carried a parseable enrollment value
    pub enrollment_reported: bool,
    pub start_date: String,
    pub completion_date: String,
    pub results_posted_date: String,
    pub has_results: bool,
    pub detail: Option<TrialDetail>,
    pub quality: QualityFlags,
    pub source_schema: SchemaVersion,
    pub collected_at: DateTime<Utc>,
}

impl TrialRecord {
    /// Detail-complete records have been enriched successfully.
    pub fn is_detail_complete(&self) -> bool {
        self.detail.is_some()
    }
}

/// Advisory quality labels derived from a canonical record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityFlags {
    pub has_outcome: bool,
    pub has_enrollment: bool,
    pub is_complete: bool,
    pub is_large_trial: bool,
    pub has_results_data: bool,
}

/// Structure added to a record by the detail lookup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialDetail {
    pub design: StudyDesign,
    pub eligibility_criteria: String,
    pub interventions: Vec<InterventionDetail>,
    pub primary_outcome_plans: Vec<OutcomePlan>,
    pub outcome_measures: Vec<OutcomeMeasure>,
    pub adverse_events: Option<AdverseEventSummary>,
    pub has_participant_flow: bool,
    pub has_baseline: bool,
    pub last_update_posted: String,
}

impl TrialDetail {
    /// True when at least one outcome measure reports results.
    pub fn has_outcome_data(&self) -> bool {
        !self.outcome_measures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyDesign {
    pub study_type: String,
    pub allocation: String,
    pub masking: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionDetail {
    pub intervention_type: String,
    pub name: String,
    pub description: String,
}

/// A registered primary outcome as planned in the protocol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomePlan {
    pub measure: String,
    pub time_frame: String,
    pub description: String,
}

/// A reported outcome measure with its statistical analyses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeMeasure {
    pub title: String,
    pub description: String,
    pub time_frame: String,
    pub measure_type: String,
    pub analyses: Vec<StatisticalAnalysis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalAnalysis {
    pub group_description: String,
    pub method: String,
    pub p_value: String,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdverseEventSummary {
    pub time_frame: String,
    pub description: String,
    pub groups: Vec<AdverseEventGroup>,
    pub serious_event_terms: usize,
    pub other_event_terms: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdverseEventGroup {
    pub title: String,
    pub serious_affected: u64,
    pub serious_at_risk: u64,
    pub other_affected: u64,
    pub other_at_risk: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_round_trips_through_str() {
        for version in [
            SchemaVersion::V1Fields,
            SchemaVersion::V2Structured,
            SchemaVersion::Pubmed,
        ] {
            assert_eq!(version.as_str().parse::<SchemaVersion>().unwrap(), version);
        }
        assert!("v3".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_schema_version_serializes_as_tag() {
        let json = serde_json::to_string(&SchemaVersion::V2Structured).unwrap();
        assert_eq!(json, "\"v2_structured\"");
    }
}
