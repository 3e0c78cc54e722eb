/// Registry endpoint and naming constants shared across the crate

// Schema version tags carried on every source document
pub const SCHEMA_V1_FIELDS: &str = "v1_fields";
pub const SCHEMA_V2_STRUCTURED: &str = "v2_structured";
pub const SCHEMA_PUBMED: &str = "pubmed";

// Source identifiers used in logs and report source errors
pub const CTGOV_V1_SOURCE: &str = "clinicaltrials_v1";
pub const CTGOV_V2_SOURCE: &str = "clinicaltrials_v2";
pub const PUBMED_SOURCE: &str = "pubmed";

// Default base URLs
pub const CTGOV_V1_BASE_URL: &str = "https://clinicaltrials.gov/api/query";
pub const CTGOV_V2_BASE_URL: &str = "https://clinicaltrials.gov/api/v2";
pub const PUBMED_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Public study page; the report links each record's results tab from here
pub const CTGOV_STUDY_URL: &str = "https://clinicaltrials.gov/study";

// Page sizes used by the reference flows
pub const DEFAULT_SELECTION_LIMIT: usize = 20;
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Completed, interventional phase 3 trials with posted results
pub const DEFAULT_QUERY_EXPRESSION: &str = "AREA[StudyType]EXACT[\"Interventional\"] AND AREA[Phase]PHASE3 AND AREA[OverallStatus]EXACT[\"Completed\"] AND AREA[HasResults]EXACT[\"true\"]";

/// Fields requested from the v1 study_fields endpoint
pub const V1_LIST_FIELDS: &[&str] = &[
    "NCTId",
    "BriefTitle",
    "OfficialTitle",
    "Condition",
    "InterventionName",
    "PrimaryOutcomeMeasure",
    "SecondaryOutcomeMeasure",
    "Phase",
    "OverallStatus",
    "StartDate",
    "CompletionDate",
    "EnrollmentCount",
    "HasResults",
    "ResultsFirstPostDate",
];

pub const USER_AGENT: &str = concat!("trial_collector/", env!("CARGO_PKG_VERSION"));

pub fn results_url(id: &str) -> String {
    format!("{}/{}/results", CTGOV_STUDY_URL, id)
}
