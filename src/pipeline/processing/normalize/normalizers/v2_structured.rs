use super::{
    AdverseEventPaths, AnalysisPaths, DetailMapping, InterventionPaths, ListMapping,
    OutcomeMeasurePaths, OutcomePlanPaths,
};

/// `/api/v2/studies` pages: `{"studies": [{"protocolSection": {...}, "hasResults": true}], "nextPageToken": "..."}`
pub static V2_LIST: ListMapping = ListMapping {
    records: &["studies[]"],
    id: &["protocolSection.identificationModule.nctId"],
    title: &["protocolSection.identificationModule.briefTitle"],
    official_title: &["protocolSection.identificationModule.officialTitle"],
    conditions: &["protocolSection.conditionsModule.conditions"],
    interventions: &["protocolSection.armsInterventionsModule.interventions[].name"],
    primary_outcomes: &["protocolSection.outcomesModule.primaryOutcomes[].measure"],
    secondary_outcomes: &["protocolSection.outcomesModule.secondaryOutcomes[].measure"],
    phase: &["protocolSection.designModule.phases"],
    overall_status: &["protocolSection.statusModule.overallStatus"],
    enrollment_count: &["protocolSection.designModule.enrollmentInfo.count"],
    start_date: &["protocolSection.statusModule.startDateStruct.date"],
    completion_date: &[
        "protocolSection.statusModule.completionDateStruct.date",
        "protocolSection.statusModule.primaryCompletionDateStruct.date",
    ],
    results_posted_date: &["protocolSection.statusModule.resultsFirstPostDateStruct.date"],
    has_results: &["hasResults"],
};

/// `/api/v2/studies/{nctId}` returns the study object itself
pub static V2_DETAIL: DetailMapping = DetailMapping {
    roots: &["studies[]"],
    protocol_section: &["protocolSection"],
    study_type: &["protocolSection.designModule.studyType"],
    allocation: &["protocolSection.designModule.designInfo.allocation"],
    masking: &["protocolSection.designModule.designInfo.maskingInfo.masking"],
    eligibility_criteria: &["protocolSection.eligibilityModule.eligibilityCriteria"],
    last_update_posted: &["protocolSection.statusModule.lastUpdatePostDateStruct.date"],
    interventions: InterventionPaths {
        items: &["protocolSection.armsInterventionsModule.interventions[]"],
        intervention_type: &["type"],
        name: &["name"],
        description: &["description"],
    },
    primary_outcome_plans: OutcomePlanPaths {
        items: &["protocolSection.outcomesModule.primaryOutcomes[]"],
        measure: &["measure"],
        time_frame: &["timeFrame"],
        description: &["description"],
    },
    outcome_measures: OutcomeMeasurePaths {
        items: &["resultsSection.outcomeMeasuresModule.outcomeMeasures[]"],
        title: &["title"],
        description: &["description"],
        time_frame: &["timeFrame"],
        measure_type: &["type"],
        analyses: AnalysisPaths {
            items: &["analyses[]"],
            group_description: &["groupDescription"],
            method: &["statisticalMethod"],
            p_value: &["pValue"],
            comment: &["statisticalComment"],
        },
    },
    adverse_events: AdverseEventPaths {
        module: &["resultsSection.adverseEventsModule"],
        time_frame: &["timeFrame"],
        description: &["description"],
        groups: &["eventGroups[]"],
        group_title: &["title"],
        serious_affected: &["seriousNumAffected"],
        serious_at_risk: &["seriousNumAtRisk"],
        other_affected: &["otherNumAffected"],
        other_at_risk: &["otherNumAtRisk"],
        serious_events: &["seriousEvents[]"],
        other_events: &["otherEvents[]"],
    },
    participant_flow: &["resultsSection.participantFlowModule"],
    baseline: &["resultsSection.baselineCharacteristicsModule"],
};
