// Pipeline processing: normalization, quality scoring, selection and detail enrichment

pub mod normalize;
pub mod quality_gate;
pub mod select;
pub mod enrich;
