// Batch enrichment pipeline: processing stages, literature branch and report assembly

pub mod cancel;
pub mod literature;
pub mod orchestrator;
pub mod processing;
pub mod report;

pub use cancel::{CancelHandle, CancelSignal};
pub use orchestrator::{run, Pipeline};
pub use report::Report;
