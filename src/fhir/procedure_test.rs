use super::*;
use time::macros::date;

fn retrieval() -> TreatmentProcedure {
    TreatmentProcedure {
        id: "proc-1".into(),
        patient_id: "pat-1".into(),
        kind: ProcedureKind::EggRetrieval,
        status: ProcedureStatus::Completed,
        performed_date: Some(date!(2024 - 03 - 14)),
        notes: Some("14 oocytes retrieved".into()),
    }
}

#[test]
fn round_trip_drops_only_notes() {
    let p = retrieval();
    let back = from_fhir_treatment(&to_fhir_procedure(&p), "other");
    assert_eq!(back, TreatmentProcedure { notes: None, ..p });
}

#[test]
fn notes_are_written() {
    let fhir = to_fhir_procedure(&retrieval());
    assert_eq!(fhir.note[0].text, "14 oocytes retrieved");
    assert_eq!(fhir.status, "completed");
    assert_eq!(fhir.performed_date_time.as_deref(), Some("2024-03-14"));
}

#[test]
fn every_status_round_trips() {
    for status in [
        ProcedureStatus::Scheduled,
        ProcedureStatus::InProgress,
        ProcedureStatus::Completed,
        ProcedureStatus::Cancelled,
    ] {
        let p = TreatmentProcedure { status, ..retrieval() };
        assert_eq!(from_fhir_treatment(&to_fhir_procedure(&p), "x").status, status);
    }
}

#[test]
fn foreign_code_becomes_other() {
    let fhir = Procedure {
        id: Some("emr-77".into()),
        status: "unknown".into(),
        code: CodeableConcept::coded("http://snomed.info/sct", "225317005", Some("Hysteroscopy")),
        ..Procedure::default()
    };
    let p = from_fhir_treatment(&fhir, "pat-5");
    assert_eq!(p.kind, ProcedureKind::Other("Hysteroscopy".into()));
    assert_eq!(p.status, ProcedureStatus::Scheduled);
    assert_eq!(p.id, "emr-77");
    assert_eq!(p.patient_id, "pat-5");
}
