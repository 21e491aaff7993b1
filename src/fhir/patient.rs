//! Patient ↔ FHIR Patient.
//!
//! Owned fields: name, birth date, gender, email, phone, address and MRN.
//! All of them survive a round trip.

use super::{Address, CodeableConcept, ContactPoint, HumanName, IDENTIFIER_TYPE_SYSTEM, Identifier, Patient};
use super::{format_date, parse_date};
use crate::clinical::{ClinicalPatient, Gender, PostalAddress};

const MRN_TYPE_CODE: &str = "MR";

#[must_use]
pub fn to_fhir_patient(patient: &ClinicalPatient) -> Patient {
    let mut telecom = Vec::new();
    if let Some(email) = &patient.email {
        telecom.push(contact("email", email, None));
    }
    if let Some(phone) = &patient.phone {
        telecom.push(contact("phone", phone, Some("mobile")));
    }

    Patient {
        id: Some(patient.id.clone()),
        identifier: patient
            .mrn
            .iter()
            .map(|mrn| Identifier {
                kind: Some(CodeableConcept::coded(
                    IDENTIFIER_TYPE_SYSTEM,
                    MRN_TYPE_CODE,
                    Some("Medical record number"),
                )),
                system: None,
                value: Some(mrn.clone()),
            })
            .collect(),
        name: vec![HumanName {
            usage: Some("official".into()),
            family: Some(patient.last_name.clone()),
            given: vec![patient.first_name.clone()],
        }],
        telecom,
        gender: patient.gender.map(|g| gender_code(g).to_string()),
        birth_date: patient.date_of_birth.map(format_date),
        address: patient.address.iter().map(to_fhir_address).collect(),
    }
}

/// EMR patient → internal. Missing pieces become `None` or empty strings.
#[must_use]
pub fn from_fhir_patient(patient: &Patient) -> ClinicalPatient {
    let name = patient
        .name
        .iter()
        .find(|n| n.usage.as_deref() == Some("official"))
        .or_else(|| patient.name.first());

    ClinicalPatient {
        id: patient.id.clone().unwrap_or_default(),
        first_name: name.map(|n| n.given.join(" ")).unwrap_or_default(),
        last_name: name.and_then(|n| n.family.clone()).unwrap_or_default(),
        date_of_birth: patient.birth_date.as_deref().and_then(parse_date),
        gender: patient.gender.as_deref().and_then(parse_gender),
        email: telecom_value(&patient.telecom, "email"),
        phone: telecom_value(&patient.telecom, "phone"),
        address: patient.address.first().map(from_fhir_address),
        mrn: patient
            .identifier
            .iter()
            .find(|i| {
                i.kind
                    .as_ref()
                    .and_then(|k| k.code_in(IDENTIFIER_TYPE_SYSTEM))
                    == Some(MRN_TYPE_CODE)
            })
            .and_then(|i| i.value.clone()),
    }
}

fn contact(system: &str, value: &str, usage: Option<&str>) -> ContactPoint {
    ContactPoint {
        system: Some(system.to_string()),
        value: Some(value.to_string()),
        usage: usage.map(str::to_string),
    }
}

fn telecom_value(telecom: &[ContactPoint], system: &str) -> Option<String> {
    telecom
        .iter()
        .find(|c| c.system.as_deref() == Some(system))
        .and_then(|c| c.value.clone())
}

fn gender_code(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => "female",
        Gender::Male => "male",
        Gender::Other => "other",
        Gender::Unknown => "unknown",
    }
}

fn parse_gender(code: &str) -> Option<Gender> {
    match code {
        "female" => Some(Gender::Female),
        "male" => Some(Gender::Male),
        "other" => Some(Gender::Other),
        "unknown" => Some(Gender::Unknown),
        _ => None,
    }
}

fn to_fhir_address(address: &PostalAddress) -> Address {
    Address {
        line: address.line.clone(),
        city: address.city.clone(),
        state: address.state.clone(),
        postal_code: address.postal_code.clone(),
        country: address.country.clone(),
    }
}

fn from_fhir_address(address: &Address) -> PostalAddress {
    PostalAddress {
        line: address.line.clone(),
        city: address.city.clone(),
        state: address.state.clone(),
        postal_code: address.postal_code.clone(),
        country: address.country.clone(),
    }
}

#[cfg(test)]
#[path = "patient_test.rs"]
mod tests;
