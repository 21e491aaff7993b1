//! Internal clinical records.
//!
//! Plain data keyed by stable internal ids. These are what the rest of the
//! application stores and renders; the `fhir` mappers translate them to and
//! from EMR wire resources.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::llm::types::{InterventionPhase, InterventionPlanResult};

// =============================================================================
// PATIENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Female,
    Male,
    Other,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub line: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalPatient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<Date>,
    pub gender: Option<Gender>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<PostalAddress>,
    /// Medical record number assigned by the EMR.
    pub mrn: Option<String>,
}

// =============================================================================
// CYCLE + MEDICATION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleType {
    Ivf,
    Icsi,
    FrozenEmbryoTransfer,
    Iui,
    EggFreezing,
}

impl CycleType {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Ivf => "ivf",
            Self::Icsi => "icsi",
            Self::FrozenEmbryoTransfer => "frozen-embryo-transfer",
            Self::Iui => "iui",
            Self::EggFreezing => "egg-freezing",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ivf" => Some(Self::Ivf),
            "icsi" => Some(Self::Icsi),
            "frozen-embryo-transfer" | "fet" => Some(Self::FrozenEmbryoTransfer),
            "iui" => Some(Self::Iui),
            "egg-freezing" => Some(Self::EggFreezing),
            _ => None,
        }
    }
}

/// Where a cycle currently is. Stimulation → retrieval → transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CycleStatus {
    Planning,
    Stimulation,
    Retrieval,
    Transfer,
    TwoWeekWait,
    Completed,
    Cancelled,
}

impl CycleStatus {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Stimulation => "stimulation",
            Self::Retrieval => "retrieval",
            Self::Transfer => "transfer",
            Self::TwoWeekWait => "two-week-wait",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "planning" => Some(Self::Planning),
            "stimulation" => Some(Self::Stimulation),
            "retrieval" => Some(Self::Retrieval),
            "transfer" => Some(Self::Transfer),
            "two-week-wait" => Some(Self::TwoWeekWait),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    pub name: String,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentCycle {
    pub id: String,
    pub patient_id: String,
    pub cycle_number: u32,
    pub cycle_type: CycleType,
    pub status: CycleStatus,
    pub protocol: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub medications: Vec<Medication>,
}

// =============================================================================
// MEASUREMENTS (monitoring, assessments, AI analysis, outcomes)
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

/// Named values as produced by assessments or AI analysis, keyed by measurement name.
pub type Measurements = BTreeMap<String, MeasurementValue>;

/// One recorded value read back from the EMR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    pub id: Option<String>,
    pub name: String,
    pub value: MeasurementValue,
    pub unit: Option<String>,
    pub effective_date: Option<Date>,
}

// =============================================================================
// PROCEDURE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureKind {
    EggRetrieval,
    EmbryoTransfer,
    Iui,
    /// Any other procedure code the EMR sends, kept verbatim.
    Other(String),
}

impl ProcedureKind {
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::EggRetrieval => "egg-retrieval",
            Self::EmbryoTransfer => "embryo-transfer",
            Self::Iui => "iui",
            Self::Other(code) => code,
        }
    }

    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "egg-retrieval" => Self::EggRetrieval,
            "embryo-transfer" => Self::EmbryoTransfer,
            "iui" => Self::Iui,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentProcedure {
    pub id: String,
    pub patient_id: String,
    pub kind: ProcedureKind,
    pub status: ProcedureStatus,
    pub performed_date: Option<Date>,
    /// Written to the EMR as a note; never read back.
    pub notes: Option<String>,
}

// =============================================================================
// COUNSELING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionType {
    Initial,
    FollowUp,
    Couples,
    Crisis,
    Group,
}

impl SessionType {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::FollowUp => "follow-up",
            Self::Couples => "couples",
            Self::Crisis => "crisis",
            Self::Group => "group",
        }
    }

    #[must_use]
    pub fn display(self) -> &'static str {
        match self {
            Self::Initial => "Initial fertility counseling session",
            Self::FollowUp => "Follow-up fertility counseling session",
            Self::Couples => "Couples fertility counseling session",
            Self::Crisis => "Crisis counseling session",
            Self::Group => "Group fertility counseling session",
        }
    }
}

/// A counseling session to push to the EMR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselingSession {
    pub id: String,
    /// EMR-side patient id.
    pub patient_id: String,
    pub counselor_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub session_date: OffsetDateTime,
    pub session_type: SessionType,
    pub duration_minutes: u32,
    /// Written to the EMR as free text; never read back.
    pub notes: Option<String>,
    pub ai_analysis: Option<Measurements>,
    pub assessment_scores: Option<Measurements>,
    pub intervention_plan: Option<InterventionPlanResult>,
}

/// Encounter as seen on the read path. Sessions are not re-imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterSummary {
    pub id: String,
    pub status: String,
    pub session_type: Option<String>,
    pub start: Option<String>,
}

/// Intervention plan read back from a CarePlan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselingPlanSummary {
    pub id: String,
    pub title: Option<String>,
    pub status: String,
    pub phases: Vec<InterventionPhase>,
}

// =============================================================================
// AGGREGATE
// =============================================================================

/// Which sub-resource a best-effort step was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubResource {
    Monitoring,
    Outcomes,
    Encounters,
    Cycles,
    CounselingPlans,
    Procedures,
    AiAnalysis,
    Assessments,
    CarePlan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubResourceFailure {
    pub resource: SubResource,
    pub error: String,
}

/// Everything pulled for one patient. `None` sections were skipped or failed;
/// `failures` says which.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalRecord {
    pub patient: ClinicalPatient,
    pub cycles: Option<Vec<TreatmentCycle>>,
    pub monitoring: Option<Vec<Measurement>>,
    pub outcomes: Option<Vec<Measurement>>,
    pub procedures: Option<Vec<TreatmentProcedure>>,
    pub encounters: Option<Vec<EncounterSummary>>,
    pub counseling_plans: Option<Vec<CounselingPlanSummary>>,
    pub failures: Vec<SubResourceFailure>,
}
