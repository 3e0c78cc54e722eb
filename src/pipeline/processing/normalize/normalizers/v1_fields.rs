use super::{
    AdverseEventPaths, AnalysisPaths, DetailMapping, InterventionPaths, ListMapping,
    OutcomeMeasurePaths, OutcomePlanPaths,
};

/// Legacy `study_fields` responses: each study is an object whose values are
/// arrays of strings, e.g. `{"NCTId": ["NCT00000001"], "Condition": ["A", "B"]}`
pub static V1_LIST: ListMapping = ListMapping {
    records: &["StudyFieldsResponse.StudyFields[]"],
    id: &["NCTId"],
    title: &["BriefTitle"],
    official_title: &["OfficialTitle"],
    conditions: &["Condition"],
    interventions: &["InterventionName"],
    primary_outcomes: &["PrimaryOutcomeMeasure"],
    secondary_outcomes: &["SecondaryOutcomeMeasure"],
    phase: &["Phase"],
    overall_status: &["OverallStatus"],
    enrollment_count: &["EnrollmentCount"],
    start_date: &["StartDate"],
    completion_date: &["CompletionDate", "PrimaryCompletionDate"],
    results_posted_date: &["ResultsFirstPostDate"],
    has_results: &["HasResults"],
};

/// Legacy `full_studies` responses (PascalCase module objects)
pub static V1_DETAIL: DetailMapping = DetailMapping {
    roots: &["FullStudiesResponse.FullStudies[].Study", "Study"],
    protocol_section: &["ProtocolSection"],
    study_type: &["ProtocolSection.DesignModule.StudyType"],
    allocation: &["ProtocolSection.DesignModule.DesignInfo.DesignAllocation"],
    masking: &[
        "ProtocolSection.DesignModule.DesignInfo.DesignMaskingInfo.DesignMasking",
        "ProtocolSection.DesignModule.DesignInfo.DesignMasking",
    ],
    eligibility_criteria: &["ProtocolSection.EligibilityModule.EligibilityCriteria"],
    last_update_posted: &[
        "ProtocolSection.StatusModule.LastUpdatePostDateStruct.LastUpdatePostDate",
        "ProtocolSection.StatusModule.LastUpdatePostDate",
    ],
    interventions: InterventionPaths {
        items: &["ProtocolSection.ArmsInterventionsModule.InterventionList.Intervention[]"],
        intervention_type: &["InterventionType"],
        name: &["InterventionName"],
        description: &["InterventionDescription"],
    },
    primary_outcome_plans: OutcomePlanPaths {
        items: &["ProtocolSection.OutcomesModule.PrimaryOutcomeList.PrimaryOutcome[]"],
        measure: &["PrimaryOutcomeMeasure"],
        time_frame: &["PrimaryOutcomeTimeFrame"],
        description: &["PrimaryOutcomeDescription"],
    },
    outcome_measures: OutcomeMeasurePaths {
        items: &["ResultsSection.OutcomeMeasuresModule.OutcomeMeasureList.OutcomeMeasure[]"],
        title: &["OutcomeMeasureTitle"],
        description: &["OutcomeMeasureDescription"],
        time_frame: &["OutcomeMeasureTimeFrame"],
        measure_type: &["OutcomeMeasureType"],
        analyses: AnalysisPaths {
            items: &["OutcomeMeasureAnalysisList.OutcomeMeasureAnalysis[]"],
            group_description: &["OutcomeMeasureAnalysisGroupDescription"],
            method: &["OutcomeMeasureAnalysisStatisticalMethod"],
            p_value: &["OutcomeMeasureAnalysisPValue"],
            comment: &["OutcomeMeasureAnalysisStatisticalComment"],
        },
    },
    adverse_events: AdverseEventPaths {
        module: &["ResultsSection.AdverseEventsModule"],
        time_frame: &["EventsTimeFrame"],
        description: &["EventsDescription"],
        groups: &["EventGroupList.EventGroup[]"],
        group_title: &["EventGroupTitle"],
        serious_affected: &["EventGroupSeriousNumAffected"],
        serious_at_risk: &["EventGroupSeriousNumAtRisk"],
        other_affected: &["EventGroupOtherNumAffected"],
        other_at_risk: &["EventGroupOtherNumAtRisk"],
        serious_events: &["SeriousEventList.SeriousEvent[]"],
        other_events: &["OtherEventList.OtherEvent[]"],
    },
    participant_flow: &["ResultsSection.ParticipantFlowModule"],
    baseline: &["ResultsSection.BaselineCharacteristicsModule"],
};
