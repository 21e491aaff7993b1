//! Measurements ↔ FHIR Observations.
//!
//! DESIGN
//! ======
//! One fixed table maps each measurement name the application produces to a
//! code, category and unit. LOINC is used where a standard code exists;
//! everything else gets a code in [`LOCAL_CODE_SYSTEM`]. Writing a name the
//! table doesn't know is an error: dropping it silently would lose clinical
//! data. Reading is lenient and keeps unknown codes under their label.

use super::{
    CodeableConcept, LOCAL_CODE_SYSTEM, LOINC_SYSTEM, MappingError, OBSERVATION_CATEGORY_SYSTEM, Observation,
    Quantity, Reference, parse_date,
};
use crate::clinical::{Measurement, MeasurementValue, Measurements};

pub const CATEGORY_SURVEY: &str = "survey";
pub const CATEGORY_LABORATORY: &str = "laboratory";
pub const CATEGORY_EXAM: &str = "exam";

/// Local code for cycle outcomes; the EMR client searches on it.
pub const CYCLE_OUTCOME_CODE: &str = "cycle-outcome";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationCode {
    /// Measurement name as used in [`Measurements`] keys.
    pub name: &'static str,
    pub system: &'static str,
    pub code: &'static str,
    pub display: &'static str,
    pub category: &'static str,
    pub unit: Option<&'static str>,
    /// Text values are written as a coded concept instead of a string.
    pub coded_value: bool,
}

const fn entry(
    name: &'static str,
    system: &'static str,
    code: &'static str,
    display: &'static str,
    category: &'static str,
    unit: Option<&'static str>,
) -> ObservationCode {
    ObservationCode { name, system, code, display, category, unit, coded_value: false }
}

pub static CODE_TABLE: &[ObservationCode] = &[
    // Validated questionnaires.
    entry("anxietyScore", LOINC_SYSTEM, "70274-6", "GAD-7 total score", CATEGORY_SURVEY, Some("{score}")),
    entry("depressionScore", LOINC_SYSTEM, "44261-6", "PHQ-9 total score", CATEGORY_SURVEY, Some("{score}")),
    entry("stressScore", LOCAL_CODE_SYSTEM, "stress-score", "Perceived stress score", CATEGORY_SURVEY, Some("{score}")),
    entry("fertiqolScore", LOCAL_CODE_SYSTEM, "fertiqol-score", "FertiQoL total score", CATEGORY_SURVEY, Some("{score}")),
    // AI analysis.
    entry("stressLevel", LOCAL_CODE_SYSTEM, "ai-stress-level", "AI-assessed stress level", CATEGORY_SURVEY, None),
    entry("anxietyLevel", LOCAL_CODE_SYSTEM, "ai-anxiety-level", "AI-assessed anxiety level", CATEGORY_SURVEY, None),
    entry("copingStyle", LOCAL_CODE_SYSTEM, "ai-coping-style", "AI-assessed coping style", CATEGORY_SURVEY, None),
    entry("emotionalState", LOCAL_CODE_SYSTEM, "ai-emotional-state", "AI-assessed emotional state", CATEGORY_SURVEY, None),
    entry("supportSystem", LOCAL_CODE_SYSTEM, "ai-support-system", "AI-assessed support system", CATEGORY_SURVEY, None),
    // Cycle monitoring.
    entry("estradiol", LOINC_SYSTEM, "2243-4", "Estradiol [Mass/volume] in Serum or Plasma", CATEGORY_LABORATORY, Some("pg/mL")),
    entry("lh", LOINC_SYSTEM, "10501-5", "Lutropin [Units/volume] in Serum or Plasma", CATEGORY_LABORATORY, Some("m[IU]/mL")),
    entry("progesterone", LOINC_SYSTEM, "2839-9", "Progesterone [Mass/volume] in Serum or Plasma", CATEGORY_LABORATORY, Some("ng/mL")),
    entry("hcg", LOINC_SYSTEM, "21198-7", "Choriogonadotropin.beta subunit [Units/volume] in Serum or Plasma", CATEGORY_LABORATORY, Some("m[IU]/mL")),
    entry("follicleCount", LOCAL_CODE_SYSTEM, "follicle-count", "Follicle count", CATEGORY_LABORATORY, Some("{count}")),
    entry("endometrialThickness", LOCAL_CODE_SYSTEM, "endometrial-thickness", "Endometrial thickness", CATEGORY_LABORATORY, Some("mm")),
    // Outcome.
    ObservationCode { coded_value: true, ..entry("cycleOutcome", LOCAL_CODE_SYSTEM, CYCLE_OUTCOME_CODE, "Treatment cycle outcome", CATEGORY_EXAM, None) },
];

#[must_use]
pub fn lookup_by_name(name: &str) -> Option<&'static ObservationCode> {
    CODE_TABLE.iter().find(|c| c.name == name)
}

#[must_use]
pub fn lookup_by_code(concept: &CodeableConcept) -> Option<&'static ObservationCode> {
    CODE_TABLE
        .iter()
        .find(|c| concept.code_in(c.system) == Some(c.code))
}

/// References every written Observation carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationLinks {
    pub patient_id: String,
    pub encounter_id: Option<String>,
    /// FHIR `dateTime` for `effectiveDateTime`.
    pub effective: Option<String>,
}

/// One Observation per measurement, in name order.
///
/// # Errors
///
/// Returns [`MappingError::UnmappedField`] for a name missing from [`CODE_TABLE`],
/// and [`MappingError::InvalidValue`] for a non-finite number. Nothing is
/// returned unless every measurement maps.
pub fn to_fhir_observations(
    measurements: &Measurements,
    links: &ObservationLinks,
) -> Result<Vec<Observation>, MappingError> {
    measurements
        .iter()
        .map(|(name, value)| {
            let code = lookup_by_name(name).ok_or_else(|| MappingError::UnmappedField { field: name.clone() })?;
            to_fhir_observation(code, value, links)
        })
        .collect()
}

fn to_fhir_observation(
    code: &ObservationCode,
    value: &MeasurementValue,
    links: &ObservationLinks,
) -> Result<Observation, MappingError> {
    let mut obs = Observation {
        id: None,
        status: "final".into(),
        category: vec![CodeableConcept::coded(OBSERVATION_CATEGORY_SYSTEM, code.category, None)],
        code: CodeableConcept::coded(code.system, code.code, Some(code.display)),
        subject: Some(Reference::to("Patient", &links.patient_id)),
        encounter: links.encounter_id.as_deref().map(|id| Reference::to("Encounter", id)),
        effective_date_time: links.effective.clone(),
        ..Observation::default()
    };

    match value {
        MeasurementValue::Number(n) if !n.is_finite() => {
            return Err(MappingError::InvalidValue {
                field: code.name.to_string(),
                reason: "not a finite number".into(),
            });
        }
        MeasurementValue::Number(n) => {
            obs.value_quantity = Some(match code.unit {
                Some(unit) => Quantity::ucum(*n, unit),
                None => Quantity { value: Some(*n), ..Quantity::default() },
            });
        }
        MeasurementValue::Text(text) if code.coded_value => {
            obs.value_codeable_concept = Some(CodeableConcept::coded(LOCAL_CODE_SYSTEM, text, Some(text)));
        }
        MeasurementValue::Text(text) => obs.value_string = Some(text.clone()),
    }
    Ok(obs)
}

/// EMR Observation → measurement. `None` when it carries no usable value.
#[must_use]
pub fn from_fhir_observation(obs: &Observation) -> Option<Measurement> {
    let known = lookup_by_code(&obs.code);
    let name = match known {
        Some(code) => code.name.to_string(),
        None => obs.code.label()?.to_string(),
    };

    let (value, unit) = if let Some(q) = &obs.value_quantity {
        (MeasurementValue::Number(q.value?), q.unit.clone().or_else(|| q.code.clone()))
    } else if let Some(text) = &obs.value_string {
        (MeasurementValue::Text(text.clone()), None)
    } else if let Some(concept) = &obs.value_codeable_concept {
        let text = concept.code_in(LOCAL_CODE_SYSTEM).or_else(|| concept.label())?;
        (MeasurementValue::Text(text.to_string()), None)
    } else {
        return None;
    };

    Some(Measurement {
        id: obs.id.clone(),
        name,
        value,
        unit,
        effective_date: obs.effective_date_time.as_deref().and_then(parse_date),
    })
}

#[cfg(test)]
#[path = "observation_test.rs"]
mod tests;
