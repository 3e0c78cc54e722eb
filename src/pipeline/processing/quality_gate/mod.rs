use serde::{Deserialize, Serialize};

use crate::domain::{QualityFlags, TrialRecord};

/// Configuration for quality scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Enrollment above this count marks a large trial
    pub large_trial_threshold: u64,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            large_trial_threshold: 100,
        }
    }
}

/// Derives advisory quality flags from canonical records.
///
/// Scoring only labels records for the selector; it never removes data.
#[derive(Debug, Clone, Default)]
pub struct QualityScorer {
    pub config: QualityConfig,
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Score a record. Defined for every record.
    pub fn score(&self, record: &TrialRecord) -> QualityFlags {
        QualityFlags {
            has_outcome: !record.primary_outcomes.is_empty(),
            has_enrollment: record.enrollment_reported,
            is_complete: !record.completion_date.is_empty(),
            is_large_trial: record.enrollment_count > self.config.large_trial_threshold,
            has_results_data: record.has_results,
        }
    }

    /// Attach quality flags to every record
    pub fn annotate(&self, records: Vec<TrialRecord>) -> Vec<TrialRecord> {
        records
            .into_iter()
            .map(|mut record| {
                record.quality = self.score(&record);
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SchemaVersion;
    use chrono::Utc;

    fn record(enrollment: Option<u64>) -> TrialRecord {
        TrialRecord {
            id: "NCT00000001".to_string(),
            title: Some("Test trial".to_string()),
            official_title: None,
            conditions: vec!["Migraine".to_string()],
            interventions: Vec::new(),
            primary_outcomes: vec!["Monthly migraine days".to_string()],
            secondary_outcomes: Vec::new(),
            phase: "Phase 3".to_string(),
            overall_status: "Completed".to_string(),
            enrollment_count: enrollment.unwrap_or(0),
            enrollment_reported: enrollment.is_some(),
            start_date: String::new(),
            completion_date: "2019-03".to_string(),
            results_posted_date: String::new(),
            has_results: true,
            detail: None,
            quality: QualityFlags::default(),
            source_schema: SchemaVersion::V1Fields,
            collected_at: Utc::now(),
        }
    }

    #[test]
    fn test_score_complete_large_trial() {
        let flags = QualityScorer::new().score(&record(Some(500)));
        assert!(flags.has_outcome);
        assert!(flags.has_enrollment);
        assert!(flags.is_complete);
        assert!(flags.is_large_trial);
        assert!(flags.has_results_data);
    }

    #[test]
    fn test_zero_enrollment_distinguishes_unknown_from_reported() {
        let scorer = QualityScorer::new();
        assert!(!scorer.score(&record(None)).has_enrollment);
        assert!(scorer.score(&record(Some(0))).has_enrollment);
    }

    #[test]
    fn test_large_trial_threshold_is_configurable() {
        let scorer = QualityScorer::with_config(QualityConfig {
            large_trial_threshold: 1000,
        });
        assert!(!scorer.score(&record(Some(500))).is_large_trial);
        // threshold is exclusive
        let scorer = QualityScorer::new();
        assert!(!scorer.score(&record(Some(100))).is_large_trial);
        assert!(scorer.score(&record(Some(101))).is_large_trial);
    }

    #[test]
    fn test_annotate_keeps_all_records() {
        let mut bare = record(None);
        bare.primary_outcomes.clear();
        bare.completion_date.clear();
        bare.has_results = false;

        let annotated = QualityScorer::new().annotate(vec![bare, record(Some(20))]);
        assert_eq!(annotated.len(), 2);
        assert_eq!(annotated[0].quality, QualityFlags::default());
        assert!(annotated[1].quality.has_outcome);
    }
}
