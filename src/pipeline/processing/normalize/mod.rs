use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::domain::{
    AdverseEventGroup, AdverseEventSummary, DetailDocument, InterventionDetail, OutcomeMeasure,
    OutcomePlan, QualityFlags, SchemaVersion, SourceDocument, StatisticalAnalysis, StudyDesign,
    TrialDetail, TrialRecord,
};

pub mod fields;
pub mod normalizers;
pub mod registry;

use fields::{
    canonical_phase, canonical_status, dedup_preserving_order, first_string, normalize_date,
    parse_count, parse_flag, resolve_first, string_or_default, strings,
};
use normalizers::{DetailMapping, ListMapping, Paths};
use registry::MappingRegistry;

/// Maps tagged source documents into canonical trial records.
///
/// Normalization never fails: missing or malformed fields fall back to
/// `""`, `0`, `false` or an empty sequence. Study objects without an
/// identifier are not valid records and are skipped.
#[derive(Default)]
pub struct TrialNormalizer {
    registry: MappingRegistry,
}

impl TrialNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a document, stamping records with the current time
    pub fn normalize(&self, doc: SourceDocument) -> Vec<TrialRecord> {
        self.normalize_at(doc, Utc::now())
    }

    /// Normalize a document with an explicit collection timestamp
    pub fn normalize_at(&self, doc: SourceDocument, collected_at: DateTime<Utc>) -> Vec<TrialRecord> {
        let Some(mapping) = self.registry.list_mapping(doc.schema_version) else {
            debug!(
                schema = %doc.schema_version,
                source = %doc.source_id,
                "No trial mapping for schema; document yields no records"
            );
            return Vec::new();
        };

        let mut skipped = 0usize;
        let records: Vec<TrialRecord> = record_nodes(&doc.payload, mapping)
            .into_iter()
            .filter_map(|node| {
                let record = map_record(node, mapping, doc.schema_version, collected_at);
                if record.is_none() {
                    skipped += 1;
                }
                record
            })
            .collect();

        if skipped > 0 {
            debug!(source = %doc.source_id, skipped, "Skipped study objects without an identifier");
        }
        records
    }

    /// Extract the detail structure from a detail payload.
    ///
    /// Returns `None` when the payload has no recognizable protocol section.
    pub fn extract_detail(&self, doc: &DetailDocument) -> Option<TrialDetail> {
        let mapping = self.registry.detail_mapping(doc.schema_version)?;
        extract_detail(&doc.payload, mapping)
    }
}

/// Normalize a document with the built-in mappings
pub fn normalize(doc: SourceDocument) -> Vec<TrialRecord> {
    TrialNormalizer::new().normalize(doc)
}

fn record_nodes<'a>(payload: &'a Value, mapping: &ListMapping) -> Vec<&'a Value> {
    let nodes = resolve_first(payload, mapping.records);
    if !nodes.is_empty() {
        return nodes;
    }
    match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![payload],
        _ => Vec::new(),
    }
}

fn map_record(
    node: &Value,
    mapping: &ListMapping,
    schema: SchemaVersion,
    collected_at: DateTime<Utc>,
) -> Option<TrialRecord> {
    let id = first_string(node, mapping.id)?;
    let enrollment = parse_count(node, mapping.enrollment_count);
    let date = |paths: Paths| normalize_date(&string_or_default(node, paths));

    Some(TrialRecord {
        id,
        title: first_string(node, mapping.title),
        official_title: first_string(node, mapping.official_title),
        conditions: dedup_preserving_order(strings(node, mapping.conditions)),
        interventions: strings(node, mapping.interventions),
        primary_outcomes: strings(node, mapping.primary_outcomes),
        secondary_outcomes: strings(node, mapping.secondary_outcomes),
        phase: canonical_phase(&string_or_default(node, mapping.phase)),
        overall_status: canonical_status(&string_or_default(node, mapping.overall_status)),
        enrollment_count: enrollment.unwrap_or(0),
        enrollment_reported: enrollment.is_some(),
        start_date: date(mapping.start_date),
        completion_date: date(mapping.completion_date),
        results_posted_date: date(mapping.results_posted_date),
        has_results: parse_flag(node, mapping.has_results),
        detail: None,
        quality: QualityFlags::default(),
        source_schema: schema,
        collected_at,
    })
}

fn extract_detail(payload: &Value, mapping: &DetailMapping) -> Option<TrialDetail> {
    let root = resolve_first(payload, mapping.roots)
        .into_iter()
        .next()
        .unwrap_or(payload);
    if resolve_first(root, mapping.protocol_section).is_empty() {
        return None;
    }

    let interventions = resolve_first(root, mapping.interventions.items)
        .into_iter()
        .map(|item| InterventionDetail {
            intervention_type: string_or_default(item, mapping.interventions.intervention_type),
            name: string_or_default(item, mapping.interventions.name),
            description: string_or_default(item, mapping.interventions.description),
        })
        .collect();

    let primary_outcome_plans = resolve_first(root, mapping.primary_outcome_plans.items)
        .into_iter()
        .map(|item| OutcomePlan {
            measure: string_or_default(item, mapping.primary_outcome_plans.measure),
            time_frame: string_or_default(item, mapping.primary_outcome_plans.time_frame),
            description: string_or_default(item, mapping.primary_outcome_plans.description),
        })
        .collect();

    let measures = &mapping.outcome_measures;
    let outcome_measures = resolve_first(root, measures.items)
        .into_iter()
        .map(|item| OutcomeMeasure {
            title: string_or_default(item, measures.title),
            description: string_or_default(item, measures.description),
            time_frame: string_or_default(item, measures.time_frame),
            measure_type: string_or_default(item, measures.measure_type),
            analyses: resolve_first(item, measures.analyses.items)
                .into_iter()
                .map(|analysis| StatisticalAnalysis {
                    group_description: string_or_default(analysis, measures.analyses.group_description),
                    method: string_or_default(analysis, measures.analyses.method),
                    p_value: string_or_default(analysis, measures.analyses.p_value),
                    comment: string_or_default(analysis, measures.analyses.comment),
                })
                .collect(),
        })
        .collect();

    Some(TrialDetail {
        design: StudyDesign {
            study_type: canonical_status(&string_or_default(root, mapping.study_type)),
            allocation: canonical_status(&string_or_default(root, mapping.allocation)),
            masking: canonical_status(&string_or_default(root, mapping.masking)),
        },
        eligibility_criteria: string_or_default(root, mapping.eligibility_criteria),
        interventions,
        primary_outcome_plans,
        outcome_measures,
        adverse_events: extract_adverse_events(root, mapping),
        has_participant_flow: !resolve_first(root, mapping.participant_flow).is_empty(),
        has_baseline: !resolve_first(root, mapping.baseline).is_empty(),
        last_update_posted: normalize_date(&string_or_default(root, mapping.last_update_posted)),
    })
}

fn extract_adverse_events(root: &Value, mapping: &DetailMapping) -> Option<AdverseEventSummary> {
    let paths = &mapping.adverse_events;
    let module = resolve_first(root, paths.module).into_iter().next()?;

    let groups = resolve_first(module, paths.groups)
        .into_iter()
        .map(|group| AdverseEventGroup {
            title: string_or_default(group, paths.group_title),
            serious_affected: parse_count(group, paths.serious_affected).unwrap_or(0),
            serious_at_risk: parse_count(group, paths.serious_at_risk).unwrap_or(0),
            other_affected: parse_count(group, paths.other_affected).unwrap_or(0),
            other_at_risk: parse_count(group, paths.other_at_risk).unwrap_or(0),
        })
        .collect();

    Some(AdverseEventSummary {
        time_frame: string_or_default(module, paths.time_frame),
        description: string_or_default(module, paths.description),
        groups,
        serious_event_terms: resolve_first(module, paths.serious_events).len(),
        other_event_terms: resolve_first(module, paths.other_events).len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{CTGOV_V1_SOURCE, CTGOV_V2_SOURCE, PUBMED_SOURCE};
    use serde_json::json;

    fn v1_page() -> SourceDocument {
        SourceDocument::new(
            SchemaVersion::V1Fields,
            CTGOV_V1_SOURCE,
            json!({
                "StudyFieldsResponse": {
                    "NStudiesFound": 2,
                    "StudyFields": [
                        {
                            "Rank": 1,
                            "NCTId": ["NCT00000101"],
                            "BriefTitle": ["Drug A in Migraine"],
                            "Condition": ["Migraine", "Headache", "Migraine"],
                            "InterventionName": ["Drug A", "Placebo"],
                            "PrimaryOutcomeMeasure": ["Monthly migraine days"],
                            "SecondaryOutcomeMeasure": ["Responder rate", "Acute medication days"],
                            "Phase": ["Phase 3"],
                            "OverallStatus": ["Completed"],
                            "EnrollmentCount": ["812"],
                            "CompletionDate": ["March 2019"],
                            "HasResults": ["true"],
                            "ResultsFirstPostDate": ["April 2, 2020"]
                        },
                        {
                            "Rank": 2,
                            "NCTId": ["NCT00000102"],
                            "EnrollmentCount": ["unknown"]
                        }
                    ]
                }
            }),
        )
    }

    fn v2_page() -> SourceDocument {
        SourceDocument::new(
            SchemaVersion::V2Structured,
            CTGOV_V2_SOURCE,
            json!({
                "studies": [{
                    "protocolSection": {
                        "identificationModule": {
                            "nctId": "NCT00000201",
                            "briefTitle": "Drug B in Breast Cancer",
                            "officialTitle": "A Randomized Study of Drug B"
                        },
                        "statusModule": {
                            "overallStatus": "COMPLETED",
                            "startDateStruct": {"date": "2016-01"},
                            "completionDateStruct": {"date": "2019-06-30"},
                            "resultsFirstPostDateStruct": {"date": "2020-07-15"}
                        },
                        "conditionsModule": {"conditions": ["Breast Cancer"]},
                        "designModule": {
                            "phases": ["PHASE2", "PHASE3"],
                            "enrollmentInfo": {"count": 640, "type": "ACTUAL"}
                        },
                        "armsInterventionsModule": {
                            "interventions": [
                                {"type": "DRUG", "name": "Drug B"},
                                {"type": "DRUG", "name": "Letrozole"}
                            ]
                        },
                        "outcomesModule": {
                            "primaryOutcomes": [{"measure": "Progression-free survival"}]
                        }
                    },
                    "hasResults": true
                }],
                "nextPageToken": "abc"
            }),
        )
    }

    #[test]
    fn test_normalize_v1_fields_document() {
        let records = normalize(v1_page());
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.id, "NCT00000101");
        assert_eq!(first.title.as_deref(), Some("Drug A in Migraine"));
        assert_eq!(first.conditions, vec!["Migraine", "Headache"]);
        assert_eq!(first.interventions, vec!["Drug A", "Placebo"]);
        assert_eq!(first.secondary_outcomes.len(), 2);
        assert_eq!(first.phase, "Phase 3");
        assert_eq!(first.enrollment_count, 812);
        assert!(first.enrollment_reported);
        assert_eq!(first.completion_date, "2019-03");
        assert_eq!(first.results_posted_date, "2020-04-02");
        assert!(first.has_results);
        assert_eq!(first.source_schema, SchemaVersion::V1Fields);
    }

    #[test]
    fn test_unparseable_enrollment_defaults_to_zero() {
        let records = normalize(v1_page());
        let second = &records[1];
        assert_eq!(second.enrollment_count, 0);
        assert!(!second.enrollment_reported);
    }

    #[test]
    fn test_out_of_range_enrollment_is_malformed() {
        let doc = SourceDocument::new(
            SchemaVersion::V2Structured,
            CTGOV_V2_SOURCE,
            json!({"studies": [{
                "protocolSection": {
                    "identificationModule": {"nctId": "NCT00000999"},
                    "designModule": {"enrollmentInfo": {"count": 1e30}}
                }
            }]}),
        );
        let records = normalize(doc);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].enrollment_count, 0);
        assert!(!records[0].enrollment_reported);
    }

    #[test]
    fn test_missing_fields_produce_defaults() {
        let records = normalize(v1_page());
        let second = &records[1];
        assert_eq!(second.title, None);
        assert!(second.conditions.is_empty());
        assert!(second.interventions.is_empty());
        assert!(second.primary_outcomes.is_empty());
        assert_eq!(second.phase, "");
        assert_eq!(second.completion_date, "");
        assert!(!second.has_results);
        assert!(second.detail.is_none());
    }

    #[test]
    fn test_normalize_v2_structured_document() {
        let records = normalize(v2_page());
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.id, "NCT00000201");
        assert_eq!(record.official_title.as_deref(), Some("A Randomized Study of Drug B"));
        // scalar-from-list takes the first phase
        assert_eq!(record.phase, "Phase 2");
        assert_eq!(record.overall_status, "Completed");
        assert_eq!(record.enrollment_count, 640);
        assert_eq!(record.interventions, vec!["Drug B", "Letrozole"]);
        assert_eq!(record.primary_outcomes, vec!["Progression-free survival"]);
        assert_eq!(record.start_date, "2016-01");
        assert_eq!(record.completion_date, "2019-06-30");
        assert!(record.has_results);
    }

    #[test]
    fn test_study_without_id_is_skipped() {
        let doc = SourceDocument::new(
            SchemaVersion::V2Structured,
            CTGOV_V2_SOURCE,
            json!({"studies": [{"protocolSection": {}}, {"hasResults": false}]}),
        );
        assert!(normalize(doc).is_empty());
    }

    #[test]
    fn test_malformed_payload_never_panics() {
        for payload in [json!(null), json!(42), json!("text"), json!([]), json!({"studies": "nope"})] {
            let doc = SourceDocument::new(SchemaVersion::V2Structured, CTGOV_V2_SOURCE, payload);
            assert!(normalize(doc).is_empty());
        }
    }

    #[test]
    fn test_pubmed_document_yields_no_trials() {
        let doc = SourceDocument::new(
            SchemaVersion::Pubmed,
            PUBMED_SOURCE,
            json!({"esearchresult": {"idlist": ["123", "456"]}}),
        );
        assert!(normalize(doc).is_empty());
    }

    #[test]
    fn test_collected_at_is_stamped_once() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let records = TrialNormalizer::new().normalize_at(v2_page(), at);
        assert_eq!(records[0].collected_at, at);
    }

    #[test]
    fn test_extract_v2_detail() {
        let doc = DetailDocument {
            schema_version: SchemaVersion::V2Structured,
            payload: json!({
                "protocolSection": {
                    "identificationModule": {"nctId": "NCT00000201"},
                    "designModule": {
                        "studyType": "INTERVENTIONAL",
                        "designInfo": {"allocation": "RANDOMIZED", "maskingInfo": {"masking": "DOUBLE"}}
                    },
                    "armsInterventionsModule": {
                        "interventions": [{"type": "DRUG", "name": "Drug B", "description": "100 mg daily"}]
                    },
                    "outcomesModule": {
                        "primaryOutcomes": [{"measure": "PFS", "timeFrame": "24 months"}]
                    },
                    "statusModule": {"lastUpdatePostDateStruct": {"date": "2021-02-01"}}
                },
                "resultsSection": {
                    "participantFlowModule": {"groups": []},
                    "outcomeMeasuresModule": {
                        "outcomeMeasures": [{
                            "type": "PRIMARY",
                            "title": "Progression-free survival",
                            "timeFrame": "24 months",
                            "analyses": [{
                                "groupDescription": "Drug B vs placebo",
                                "statisticalMethod": "Log Rank",
                                "pValue": "<0.001"
                            }]
                        }]
                    },
                    "adverseEventsModule": {
                        "timeFrame": "2 years",
                        "eventGroups": [
                            {"title": "Drug B", "seriousNumAffected": 12, "seriousNumAtRisk": 320},
                            {"title": "Placebo", "seriousNumAffected": 9, "seriousNumAtRisk": 320}
                        ],
                        "seriousEvents": [{"term": "Anaemia"}],
                        "otherEvents": [{"term": "Nausea"}, {"term": "Fatigue"}]
                    }
                },
                "hasResults": true
            }),
        };

        let detail = TrialNormalizer::new().extract_detail(&doc).unwrap();
        assert_eq!(detail.design.study_type, "Interventional");
        assert_eq!(detail.design.allocation, "Randomized");
        assert_eq!(detail.design.masking, "Double");
        assert_eq!(detail.interventions[0].description, "100 mg daily");
        assert_eq!(detail.primary_outcome_plans[0].time_frame, "24 months");
        assert_eq!(detail.outcome_measures.len(), 1);
        let analysis = &detail.outcome_measures[0].analyses[0];
        assert_eq!(analysis.method, "Log Rank");
        assert_eq!(analysis.p_value, "<0.001");
        assert_eq!(analysis.comment, "");
        let adverse = detail.adverse_events.unwrap();
        assert_eq!(adverse.groups.len(), 2);
        assert_eq!(adverse.groups[0].serious_affected, 12);
        assert_eq!(adverse.serious_event_terms, 1);
        assert_eq!(adverse.other_event_terms, 2);
        assert!(detail.has_participant_flow);
        assert!(!detail.has_baseline);
        assert_eq!(detail.last_update_posted, "2021-02-01");
    }

    #[test]
    fn test_extract_v1_detail() {
        let doc = DetailDocument {
            schema_version: SchemaVersion::V1Fields,
            payload: json!({
                "FullStudiesResponse": {
                    "FullStudies": [{
                        "Rank": 1,
                        "Study": {
                            "ProtocolSection": {
                                "DesignModule": {
                                    "StudyType": "Interventional",
                                    "DesignInfo": {"DesignAllocation": "Randomized"}
                                },
                                "ArmsInterventionsModule": {
                                    "InterventionList": {
                                        "Intervention": [
                                            {"InterventionType": "Drug", "InterventionName": "Drug A"}
                                        ]
                                    }
                                }
                            },
                            "ResultsSection": {
                                "OutcomeMeasuresModule": {
                                    "OutcomeMeasureList": {
                                        "OutcomeMeasure": [{
                                            "OutcomeMeasureTitle": "Monthly migraine days",
                                            "OutcomeMeasureAnalysisList": {
                                                "OutcomeMeasureAnalysis": [
                                                    {"OutcomeMeasureAnalysisPValue": "0.003"}
                                                ]
                                            }
                                        }]
                                    }
                                }
                            }
                        }
                    }]
                }
            }),
        };

        let detail = TrialNormalizer::new().extract_detail(&doc).unwrap();
        assert_eq!(detail.design.study_type, "Interventional");
        assert_eq!(detail.interventions[0].intervention_type, "Drug");
        assert_eq!(detail.outcome_measures[0].analyses[0].p_value, "0.003");
        assert!(detail.adverse_events.is_none());
    }

    #[test]
    fn test_detail_without_protocol_section_is_malformed() {
        let doc = DetailDocument {
            schema_version: SchemaVersion::V2Structured,
            payload: json!({"message": "not found"}),
        };
        assert!(TrialNormalizer::new().extract_detail(&doc).is_none());
    }
}
