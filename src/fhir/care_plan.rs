//! Intervention plan ↔ FHIR CarePlan.
//!
//! Each phase is one activity: name in `code.text`, focus in
//! `description`, length as a `boundsDuration` in weeks and the phase's
//! activities as extensions. Goals, strategies and follow-up are written as
//! description and notes for clinicians and are not read back.

use super::{
    Annotation, CarePlan, CarePlanActivity, CarePlanActivityDetail, CodeableConcept, EXT_PHASE_ACTIVITY, Extension,
    LOCAL_CODE_SYSTEM, Quantity, Reference, Timing, TimingRepeat,
};
use crate::clinical::CounselingPlanSummary;
use crate::llm::types::{InterventionPhase, InterventionPlanResult};

pub const COUNSELING_CATEGORY: &str = "counseling-intervention";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarePlanLinks {
    pub patient_id: String,
    pub encounter_id: Option<String>,
}

#[must_use]
pub fn to_fhir_care_plan(plan: &InterventionPlanResult, links: &CarePlanLinks) -> CarePlan {
    let mut note: Vec<Annotation> = plan
        .strategies
        .iter()
        .map(|s| Annotation { text: format!("{}: {} ({})", s.name, s.description, s.frequency) })
        .collect();
    if !plan.follow_up.is_empty() {
        note.push(Annotation { text: format!("Follow-up: {}", plan.follow_up) });
    }

    CarePlan {
        status: "active".into(),
        intent: "plan".into(),
        category: vec![CodeableConcept::coded(
            LOCAL_CODE_SYSTEM,
            COUNSELING_CATEGORY,
            Some("Counseling intervention plan"),
        )],
        title: Some(plan.title.clone()),
        description: (!plan.goals.is_empty()).then(|| format!("Goals: {}", plan.goals.join("; "))),
        subject: Some(Reference::to("Patient", &links.patient_id)),
        encounter: links.encounter_id.as_deref().map(|id| Reference::to("Encounter", id)),
        activity: plan.phases.iter().map(phase_activity).collect(),
        note,
        ..CarePlan::default()
    }
}

fn phase_activity(phase: &InterventionPhase) -> CarePlanActivity {
    CarePlanActivity {
        detail: Some(CarePlanActivityDetail {
            code: Some(CodeableConcept::text(&phase.name)),
            status: "not-started".into(),
            description: Some(phase.focus.clone()),
            scheduled_timing: Some(Timing {
                repeat: Some(TimingRepeat {
                    bounds_duration: Some(Quantity::ucum(f64::from(phase.duration_weeks), "wk")),
                    ..TimingRepeat::default()
                }),
            }),
            extension: phase
                .activities
                .iter()
                .map(|a| Extension::string(EXT_PHASE_ACTIVITY, a))
                .collect(),
            ..CarePlanActivityDetail::default()
        }),
    }
}

/// EMR CarePlan → plan summary with its phases.
#[must_use]
pub fn from_fhir_care_plan(plan: &CarePlan) -> CounselingPlanSummary {
    CounselingPlanSummary {
        id: plan.id.clone().unwrap_or_default(),
        title: plan.title.clone(),
        status: plan.status.clone(),
        phases: plan
            .activity
            .iter()
            .filter_map(|a| a.detail.as_ref())
            .map(|detail| InterventionPhase {
                name: detail.code.as_ref().and_then(CodeableConcept::label).unwrap_or_default().to_string(),
                duration_weeks: detail
                    .scheduled_timing
                    .as_ref()
                    .and_then(|t| t.repeat.as_ref())
                    .and_then(|r| r.bounds_duration.as_ref())
                    .map_or(0, duration_weeks),
                focus: detail.description.clone().unwrap_or_default(),
                activities: detail
                    .extension
                    .iter()
                    .filter(|e| e.url == EXT_PHASE_ACTIVITY)
                    .filter_map(|e| e.value_string.clone())
                    .collect(),
            })
            .collect(),
    }
}

/// Whole weeks, rounding partial weeks up. Unknown units read as weeks.
fn duration_weeks(quantity: &Quantity) -> u32 {
    let Some(value) = quantity.value.filter(|v| v.is_finite() && *v > 0.0) else {
        return 0;
    };
    let unit = quantity.code.as_deref().or(quantity.unit.as_deref()).unwrap_or("wk");
    let weeks = match unit {
        "d" | "day" | "days" => value / 7.0,
        "mo" | "month" | "months" => value * 52.0 / 12.0,
        _ => value,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let whole = weeks.ceil().min(f64::from(u32::MAX)) as u32;
    whole
}

#[cfg(test)]
#[path = "care_plan_test.rs"]
mod tests;
