// Per-schema field mappings. Each registry schema contributes one table;
// the normalizer control flow never changes when a schema is added.
pub mod pubmed;
pub mod v1_fields;
pub mod v2_structured;

pub use pubmed::PUBMED_LITERATURE;
pub use v1_fields::{V1_DETAIL, V1_LIST};
pub use v2_structured::{V2_DETAIL, V2_LIST};

/// Fallback chain of source paths for one canonical field.
///
/// Paths are dot-separated object keys; a `[]` suffix flattens an array
/// (e.g. `protocolSection.armsInterventionsModule.interventions[].name`).
/// The first path that yields a non-empty value wins.
pub type Paths = &'static [&'static str];

/// Canonical field -> source paths for a list (search) document
#[derive(Debug)]
pub struct ListMapping {
    /// Where the individual study objects live inside a page payload
    pub records: Paths,
    pub id: Paths,
    pub title: Paths,
    pub official_title: Paths,
    pub conditions: Paths,
    pub interventions: Paths,
    pub primary_outcomes: Paths,
    pub secondary_outcomes: Paths,
    pub phase: Paths,
    pub overall_status: Paths,
    pub enrollment_count: Paths,
    pub start_date: Paths,
    pub completion_date: Paths,
    pub results_posted_date: Paths,
    pub has_results: Paths,
}

/// Canonical detail structure -> source paths for a detail document
#[derive(Debug)]
pub struct DetailMapping {
    /// Where the study object lives inside a detail payload
    pub roots: Paths,
    /// A detail payload without this section is malformed
    pub protocol_section: Paths,
    pub study_type: Paths,
    pub allocation: Paths,
    pub masking: Paths,
    pub eligibility_criteria: Paths,
    pub last_update_posted: Paths,
    pub interventions: InterventionPaths,
    pub primary_outcome_plans: OutcomePlanPaths,
    pub outcome_measures: OutcomeMeasurePaths,
    pub adverse_events: AdverseEventPaths,
    pub participant_flow: Paths,
    pub baseline: Paths,
}

#[derive(Debug)]
pub struct InterventionPaths {
    pub items: Paths,
    pub intervention_type: Paths,
    pub name: Paths,
    pub description: Paths,
}

#[derive(Debug)]
pub struct OutcomePlanPaths {
    pub items: Paths,
    pub measure: Paths,
    pub time_frame: Paths,
    pub description: Paths,
}

#[derive(Debug)]
pub struct OutcomeMeasurePaths {
    pub items: Paths,
    pub title: Paths,
    pub description: Paths,
    pub time_frame: Paths,
    pub measure_type: Paths,
    pub analyses: AnalysisPaths,
}

#[derive(Debug)]
pub struct AnalysisPaths {
    pub items: Paths,
    pub group_description: Paths,
    pub method: Paths,
    pub p_value: Paths,
    pub comment: Paths,
}

#[derive(Debug)]
pub struct AdverseEventPaths {
    pub module: Paths,
    pub time_frame: Paths,
    pub description: Paths,
    pub groups: Paths,
    pub group_title: Paths,
    pub serious_affected: Paths,
    pub serious_at_risk: Paths,
    pub other_affected: Paths,
    pub other_at_risk: Paths,
    pub serious_events: Paths,
    pub other_events: Paths,
}

/// Literature search and summary documents
#[derive(Debug)]
pub struct LiteratureMapping {
    pub ids: Paths,
    pub error: Paths,
    /// Object keyed by identifier holding per-article summaries
    pub summaries: Paths,
    pub title: Paths,
    pub journal: Paths,
    pub pub_date: Paths,
}
