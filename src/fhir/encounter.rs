//! Counseling session → FHIR Encounter (write-only), plus a read-side summary.

use time::Duration;

use super::{
    ACT_CODE_SYSTEM, CodeableConcept, Coding, EXT_SESSION_NOTES, Encounter, EncounterParticipant, Extension,
    Identifier, LOCAL_CODE_SYSTEM, MappingError, Period, Quantity, Reference, SESSION_ID_SYSTEM, format_datetime,
};
use crate::clinical::{CounselingSession, EncounterSummary};

/// Build the Encounter a counseling push starts with.
///
/// # Errors
///
/// Returns [`MappingError::InvalidValue`] if the session time can't be written as RFC 3339.
pub fn to_fhir_encounter(session: &CounselingSession) -> Result<Encounter, MappingError> {
    let start = format_datetime("Encounter.period.start", session.session_date)?;
    let end = format_datetime(
        "Encounter.period.end",
        session.session_date + Duration::minutes(i64::from(session.duration_minutes)),
    )?;

    Ok(Encounter {
        id: None,
        identifier: vec![Identifier::new(SESSION_ID_SYSTEM, &session.id)],
        status: "finished".into(),
        class: Some(Coding::new(ACT_CODE_SYSTEM, "AMB", Some("ambulatory"))),
        kind: vec![CodeableConcept::coded(
            LOCAL_CODE_SYSTEM,
            session.session_type.code(),
            Some(session.session_type.display()),
        )],
        subject: Some(Reference::to("Patient", &session.patient_id)),
        participant: session
            .counselor_name
            .iter()
            .map(|name| EncounterParticipant {
                individual: Some(Reference { reference: None, display: Some(name.clone()) }),
            })
            .collect(),
        period: Some(Period { start: Some(start), end: Some(end) }),
        length: Some(Quantity::ucum(f64::from(session.duration_minutes), "min")),
        extension: session
            .notes
            .iter()
            .map(|notes| Extension::string(EXT_SESSION_NOTES, notes))
            .collect(),
    })
}

#[must_use]
pub fn summarize_encounter(encounter: &Encounter) -> EncounterSummary {
    EncounterSummary {
        id: encounter.id.clone().unwrap_or_default(),
        status: encounter.status.clone(),
        session_type: encounter
            .kind
            .iter()
            .find_map(|k| k.code_in(LOCAL_CODE_SYSTEM).or_else(|| k.label()))
            .map(str::to_string),
        start: encounter.period.as_ref().and_then(|p| p.start.clone()),
    }
}

#[cfg(test)]
#[path = "encounter_test.rs"]
mod tests;
