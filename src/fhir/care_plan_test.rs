use super::*;
use crate::llm::fallback;
use serde_json::json;

fn plan() -> InterventionPlanResult {
    fallback::intervention_plan(&json!({ "personalInfo": { "firstName": "Ana", "partnerName": "Luis" } }))
}

fn links() -> CarePlanLinks {
    CarePlanLinks { patient_id: "pat-1".into(), encounter_id: Some("enc-1".into()) }
}

#[test]
fn one_activity_per_phase_with_week_bounds() {
    let p = plan();
    let cp = to_fhir_care_plan(&p, &links());
    assert_eq!(cp.activity.len(), p.phases.len());
    let first = cp.activity[0].detail.as_ref().unwrap();
    let bounds = first
        .scheduled_timing
        .as_ref()
        .and_then(|t| t.repeat.as_ref())
        .and_then(|r| r.bounds_duration.as_ref())
        .unwrap();
    assert_eq!(bounds.value, Some(f64::from(p.phases[0].duration_weeks)));
    assert_eq!(bounds.code.as_deref(), Some("wk"));
}

#[test]
fn carries_category_links_and_notes() {
    let p = plan();
    let cp = to_fhir_care_plan(&p, &links());
    assert!(cp.has_category(COUNSELING_CATEGORY));
    assert_eq!(cp.intent, "plan");
    assert_eq!(cp.encounter.as_ref().and_then(|r| r.id_of("Encounter")), Some("enc-1"));
    assert_eq!(cp.subject.as_ref().and_then(|r| r.id_of("Patient")), Some("pat-1"));
    assert!(cp.description.as_deref().is_some_and(|d| d.starts_with("Goals: ")));
    assert_eq!(cp.note.len(), p.strategies.len() + 1);
}

#[test]
fn phases_round_trip() {
    let p = plan();
    let mut cp = to_fhir_care_plan(&p, &links());
    cp.id = Some("cp-3".into());
    let summary = from_fhir_care_plan(&cp);
    assert_eq!(summary.id, "cp-3");
    assert_eq!(summary.title.as_deref(), Some(p.title.as_str()));
    assert_eq!(summary.status, "active");
    assert_eq!(summary.phases, p.phases);
}

#[test]
fn foreign_durations_convert_to_weeks() {
    let days = Quantity { value: Some(10.0), code: Some("d".into()), ..Quantity::default() };
    let months = Quantity { value: Some(3.0), unit: Some("mo".into()), ..Quantity::default() };
    let bare = Quantity { value: Some(2.0), ..Quantity::default() };
    assert_eq!(duration_weeks(&days), 2);
    assert_eq!(duration_weeks(&months), 13);
    assert_eq!(duration_weeks(&bare), 2);
    assert_eq!(duration_weeks(&Quantity::default()), 0);
}

#[test]
fn activity_without_detail_is_skipped() {
    let cp = CarePlan {
        activity: vec![CarePlanActivity { detail: None }],
        ..CarePlan::default()
    };
    assert!(from_fhir_care_plan(&cp).phases.is_empty());
}
