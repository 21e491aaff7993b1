//! Treatment cycle ↔ FHIR CarePlan (category `ivf-cycle`).
//!
//! The IVF phase, cycle type and cycle number have no FHIR home, so they
//! ride in extensions. Medications are `MedicationRequest`-kind activities.
//! On read, an unrecognized status defaults to `planning` and an unknown
//! cycle type to `ivf`.

use super::{
    CYCLE_ID_SYSTEM, CarePlan, CarePlanActivity, CarePlanActivityDetail, CodeableConcept, EXT_CYCLE_NUMBER,
    EXT_CYCLE_PHASE, EXT_CYCLE_TYPE, EXT_MEDICATION_FREQUENCY, Extension, Identifier, LOCAL_CODE_SYSTEM, Period,
    Reference, find_extension, format_date, identifier_value, parse_date,
};
use crate::clinical::{CycleStatus, CycleType, Medication, TreatmentCycle};

pub const CYCLE_CATEGORY: &str = "ivf-cycle";
const MEDICATION_KIND: &str = "MedicationRequest";

#[must_use]
pub fn to_fhir_cycle(cycle: &TreatmentCycle) -> CarePlan {
    let period = (cycle.start_date.is_some() || cycle.end_date.is_some()).then(|| Period {
        start: cycle.start_date.map(format_date),
        end: cycle.end_date.map(format_date),
    });

    CarePlan {
        id: None,
        identifier: vec![Identifier::new(CYCLE_ID_SYSTEM, &cycle.id)],
        status: care_plan_status(cycle.status).into(),
        intent: "plan".into(),
        category: vec![CodeableConcept::coded(LOCAL_CODE_SYSTEM, CYCLE_CATEGORY, Some("IVF treatment cycle"))],
        title: Some(format!("Cycle {} ({})", cycle.cycle_number, cycle.cycle_type.code())),
        description: cycle.protocol.clone(),
        subject: Some(Reference::to("Patient", &cycle.patient_id)),
        period,
        activity: cycle.medications.iter().map(medication_activity).collect(),
        extension: vec![
            Extension::code(EXT_CYCLE_PHASE, cycle.status.code()),
            Extension::code(EXT_CYCLE_TYPE, cycle.cycle_type.code()),
            Extension::integer(EXT_CYCLE_NUMBER, i64::from(cycle.cycle_number)),
        ],
        ..CarePlan::default()
    }
}

fn care_plan_status(status: CycleStatus) -> &'static str {
    match status {
        CycleStatus::Planning => "draft",
        CycleStatus::Stimulation | CycleStatus::Retrieval | CycleStatus::Transfer | CycleStatus::TwoWeekWait => {
            "active"
        }
        CycleStatus::Completed => "completed",
        CycleStatus::Cancelled => "revoked",
    }
}

fn medication_activity(medication: &Medication) -> CarePlanActivity {
    let scheduled_period = (medication.start_date.is_some() || medication.end_date.is_some()).then(|| Period {
        start: medication.start_date.map(format_date),
        end: medication.end_date.map(format_date),
    });
    CarePlanActivity {
        detail: Some(CarePlanActivityDetail {
            kind: Some(MEDICATION_KIND.into()),
            status: "in-progress".into(),
            description: medication.dosage.clone(),
            scheduled_period,
            product_codeable_concept: Some(CodeableConcept::text(&medication.name)),
            extension: medication
                .frequency
                .iter()
                .map(|f| Extension::string(EXT_MEDICATION_FREQUENCY, f))
                .collect(),
            ..CarePlanActivityDetail::default()
        }),
    }
}

/// EMR CarePlan → cycle. `patient_id` is used when the plan has no subject.
#[must_use]
pub fn from_fhir_cycle(plan: &CarePlan, patient_id: &str) -> TreatmentCycle {
    let status = ext_code(plan, EXT_CYCLE_PHASE)
        .and_then(CycleStatus::from_code)
        .unwrap_or_else(|| status_from_care_plan(&plan.status));
    let cycle_type = ext_code(plan, EXT_CYCLE_TYPE)
        .and_then(CycleType::from_code)
        .unwrap_or(CycleType::Ivf);
    let cycle_number = find_extension(&plan.extension, EXT_CYCLE_NUMBER)
        .and_then(|e| e.value_integer)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);

    TreatmentCycle {
        id: identifier_value(&plan.identifier, CYCLE_ID_SYSTEM)
            .map(str::to_string)
            .or_else(|| plan.id.clone())
            .unwrap_or_default(),
        patient_id: plan
            .subject
            .as_ref()
            .and_then(|s| s.id_of("Patient"))
            .unwrap_or(patient_id)
            .to_string(),
        cycle_number,
        cycle_type,
        status,
        protocol: plan.description.clone(),
        start_date: plan.period.as_ref().and_then(|p| p.start.as_deref()).and_then(parse_date),
        end_date: plan.period.as_ref().and_then(|p| p.end.as_deref()).and_then(parse_date),
        medications: plan
            .activity
            .iter()
            .filter_map(|a| a.detail.as_ref())
            .filter(|d| d.kind.as_deref() == Some(MEDICATION_KIND))
            .filter_map(medication_from_detail)
            .collect(),
    }
}

fn ext_code<'a>(plan: &'a CarePlan, url: &str) -> Option<&'a str> {
    find_extension(&plan.extension, url).and_then(|e| e.value_code.as_deref())
}

/// Recognized CarePlan statuses; everything else is `planning`.
fn status_from_care_plan(status: &str) -> CycleStatus {
    match status {
        "active" => CycleStatus::Stimulation,
        "completed" => CycleStatus::Completed,
        "revoked" => CycleStatus::Cancelled,
        _ => CycleStatus::Planning,
    }
}

fn medication_from_detail(detail: &CarePlanActivityDetail) -> Option<Medication> {
    let name = detail.product_codeable_concept.as_ref()?.label()?.to_string();
    let period = detail.scheduled_period.as_ref();
    Some(Medication {
        name,
        dosage: detail.description.clone(),
        frequency: find_extension(&detail.extension, EXT_MEDICATION_FREQUENCY).and_then(|e| e.value_string.clone()),
        start_date: period.and_then(|p| p.start.as_deref()).and_then(parse_date),
        end_date: period.and_then(|p| p.end.as_deref()).and_then(parse_date),
    })
}

#[cfg(test)]
#[path = "cycle_test.rs"]
mod tests;
