use super::*;
use crate::clinical::SessionType;
use time::macros::datetime;

fn session() -> CounselingSession {
    CounselingSession {
        id: "sess-1".into(),
        patient_id: "emr-pat-1".into(),
        counselor_name: Some("Dr. Rivera".into()),
        session_date: datetime!(2024-05-01 09:30:00 UTC),
        session_type: SessionType::FollowUp,
        duration_minutes: 50,
        notes: Some("Discussed coping plan".into()),
        ai_analysis: None,
        assessment_scores: None,
        intervention_plan: None,
    }
}

#[test]
fn encounter_carries_session_fields() {
    let enc = to_fhir_encounter(&session()).unwrap();
    assert_eq!(enc.status, "finished");
    assert_eq!(enc.subject.as_ref().and_then(|s| s.id_of("Patient")), Some("emr-pat-1"));
    assert_eq!(enc.kind[0].code_in(LOCAL_CODE_SYSTEM), Some("follow-up"));
    let period = enc.period.as_ref().unwrap();
    assert_eq!(period.start.as_deref(), Some("2024-05-01T09:30:00Z"));
    assert_eq!(period.end.as_deref(), Some("2024-05-01T10:20:00Z"));
    assert_eq!(enc.length.as_ref().and_then(|l| l.value), Some(50.0));
    assert_eq!(enc.participant[0].individual.as_ref().and_then(|i| i.display.as_deref()), Some("Dr. Rivera"));
    assert_eq!(crate::fhir::identifier_value(&enc.identifier, SESSION_ID_SYSTEM), Some("sess-1"));
    assert_eq!(enc.extension[0].value_string.as_deref(), Some("Discussed coping plan"));
}

#[test]
fn optional_fields_are_left_out() {
    let bare = CounselingSession { counselor_name: None, notes: None, ..session() };
    let enc = to_fhir_encounter(&bare).unwrap();
    assert!(enc.participant.is_empty());
    assert!(enc.extension.is_empty());
}

#[test]
fn summary_reads_back_type_and_start() {
    let mut enc = to_fhir_encounter(&session()).unwrap();
    enc.id = Some("enc-77".into());
    let summary = summarize_encounter(&enc);
    assert_eq!(summary.id, "enc-77");
    assert_eq!(summary.status, "finished");
    assert_eq!(summary.session_type.as_deref(), Some("follow-up"));
    assert_eq!(summary.start.as_deref(), Some("2024-05-01T09:30:00Z"));
}

#[test]
fn summary_of_foreign_encounter_uses_label() {
    let enc = Encounter {
        id: Some("x".into()),
        status: "in-progress".into(),
        kind: vec![CodeableConcept::text("Office visit")],
        ..Encounter::default()
    };
    let summary = summarize_encounter(&enc);
    assert_eq!(summary.session_type.as_deref(), Some("Office visit"));
    assert!(summary.start.is_none());
}
