//! Treatment procedure ↔ FHIR Procedure. Notes are write-only.

use super::{
    Annotation, CodeableConcept, Identifier, LOCAL_CODE_SYSTEM, PROCEDURE_ID_SYSTEM, Procedure, Reference,
    format_date, identifier_value, parse_date,
};
use crate::clinical::{ProcedureKind, ProcedureStatus, TreatmentProcedure};

#[must_use]
pub fn to_fhir_procedure(procedure: &TreatmentProcedure) -> Procedure {
    Procedure {
        id: None,
        identifier: vec![Identifier::new(PROCEDURE_ID_SYSTEM, &procedure.id)],
        status: status_code(procedure.status).into(),
        code: CodeableConcept::coded(LOCAL_CODE_SYSTEM, procedure.kind.code(), Some(display(&procedure.kind))),
        subject: Some(Reference::to("Patient", &procedure.patient_id)),
        performed_date_time: procedure.performed_date.map(format_date),
        note: procedure
            .notes
            .iter()
            .map(|text| Annotation { text: text.clone() })
            .collect(),
    }
}

/// EMR Procedure → internal. Codes outside the local system are kept as `Other`.
#[must_use]
pub fn from_fhir_treatment(procedure: &Procedure, patient_id: &str) -> TreatmentProcedure {
    let kind = match procedure.code.code_in(LOCAL_CODE_SYSTEM) {
        Some(code) => ProcedureKind::from_code(code),
        None => ProcedureKind::Other(procedure.code.label().unwrap_or("unknown").to_string()),
    };

    TreatmentProcedure {
        id: identifier_value(&procedure.identifier, PROCEDURE_ID_SYSTEM)
            .map(str::to_string)
            .or_else(|| procedure.id.clone())
            .unwrap_or_default(),
        patient_id: procedure
            .subject
            .as_ref()
            .and_then(|s| s.id_of("Patient"))
            .unwrap_or(patient_id)
            .to_string(),
        kind,
        status: parse_status(&procedure.status),
        performed_date: procedure.performed_date_time.as_deref().and_then(parse_date),
        notes: None,
    }
}

fn status_code(status: ProcedureStatus) -> &'static str {
    match status {
        ProcedureStatus::Scheduled => "preparation",
        ProcedureStatus::InProgress => "in-progress",
        ProcedureStatus::Completed => "completed",
        ProcedureStatus::Cancelled => "not-done",
    }
}

/// Unknown statuses read as scheduled.
fn parse_status(code: &str) -> ProcedureStatus {
    match code {
        "in-progress" | "on-hold" => ProcedureStatus::InProgress,
        "completed" => ProcedureStatus::Completed,
        "not-done" | "stopped" | "entered-in-error" => ProcedureStatus::Cancelled,
        _ => ProcedureStatus::Scheduled,
    }
}

fn display(kind: &ProcedureKind) -> &str {
    match kind {
        ProcedureKind::EggRetrieval => "Oocyte retrieval",
        ProcedureKind::EmbryoTransfer => "Embryo transfer",
        ProcedureKind::Iui => "Intrauterine insemination",
        ProcedureKind::Other(code) => code,
    }
}

#[cfg(test)]
#[path = "procedure_test.rs"]
mod tests;
