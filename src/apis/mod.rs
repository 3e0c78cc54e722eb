// Registry and literature adapters over HTTP

pub mod clinical_trials_v1;
pub mod clinical_trials_v2;
pub mod pubmed;

pub use clinical_trials_v1::ClinicalTrialsV1;
pub use clinical_trials_v2::ClinicalTrialsV2;
pub use pubmed::PubMed;
