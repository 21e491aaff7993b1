use super::*;
use serde_json::json;
use time::macros::date;

fn full_patient() -> ClinicalPatient {
    ClinicalPatient {
        id: "pat-001".into(),
        first_name: "Sarah".into(),
        last_name: "Johnson".into(),
        date_of_birth: Some(date!(1988 - 11 - 02)),
        gender: Some(Gender::Female),
        email: Some("sarah@example.com".into()),
        phone: Some("+1-555-0100".into()),
        address: Some(PostalAddress {
            line: vec!["12 Elm St".into(), "Apt 4".into()],
            city: Some("Portland".into()),
            state: Some("OR".into()),
            postal_code: Some("97201".into()),
            country: Some("US".into()),
        }),
        mrn: Some("MRN-778".into()),
    }
}

#[test]
fn round_trip_preserves_owned_fields() {
    let patient = full_patient();
    assert_eq!(from_fhir_patient(&to_fhir_patient(&patient)), patient);
}

#[test]
fn round_trip_survives_json() {
    let patient = full_patient();
    let wire = serde_json::to_value(crate::fhir::FhirResource::Patient(to_fhir_patient(&patient))).unwrap();
    let crate::fhir::FhirResource::Patient(back) = serde_json::from_value(wire).unwrap() else {
        panic!("expected Patient");
    };
    assert_eq!(from_fhir_patient(&back), patient);
}

#[test]
fn writes_fhir_field_names() {
    let wire = serde_json::to_value(to_fhir_patient(&full_patient())).unwrap();
    assert_eq!(wire["birthDate"], "1988-11-02");
    assert_eq!(wire["gender"], "female");
    assert_eq!(wire["name"][0]["family"], "Johnson");
    assert_eq!(wire["name"][0]["given"][0], "Sarah");
    assert_eq!(wire["address"][0]["postalCode"], "97201");
    assert_eq!(wire["identifier"][0]["type"]["coding"][0]["code"], "MR");
}

#[test]
fn sparse_emr_patient_is_tolerated() {
    let patient: Patient = serde_json::from_value(json!({
        "id": "emr-9",
        "name": [{ "use": "nickname", "given": ["Sam"] }],
        "gender": "intersex",
        "birthDate": "1990"
    }))
    .unwrap();
    let internal = from_fhir_patient(&patient);
    assert_eq!(internal.id, "emr-9");
    assert_eq!(internal.first_name, "Sam");
    assert_eq!(internal.last_name, "");
    assert_eq!(internal.gender, None);
    assert_eq!(internal.date_of_birth, None);
    assert!(internal.address.is_none());
    assert!(internal.mrn.is_none());
}

#[test]
fn official_name_preferred() {
    let patient = Patient {
        name: vec![
            HumanName { usage: Some("maiden".into()), family: Some("Old".into()), given: vec!["A".into()] },
            HumanName { usage: Some("official".into()), family: Some("New".into()), given: vec!["Ann".into(), "Marie".into()] },
        ],
        ..Patient::default()
    };
    let internal = from_fhir_patient(&patient);
    assert_eq!(internal.last_name, "New");
    assert_eq!(internal.first_name, "Ann Marie");
}
