//! EMR sync: connection test, patient pull and counseling push over FHIR.
//!
//! DESIGN
//! ======
//! Each operation captures one config snapshot at entry and builds an
//! [`EmrContext`] from it (base URL, headers, timeout, retry budget).
//!
//! - Reads are best-effort. The Patient itself is required; every other
//!   sub-resource is fetched concurrently and a failure there becomes a
//!   [`SubResourceFailure`] on the record instead of an error.
//! - Writes map everything up front, so an unmappable measurement fails
//!   before anything reaches the EMR. The Encounter is created first; linked
//!   Observations and the CarePlan follow concurrently. A failed secondary
//!   write marks the receipt partial and is not rolled back or retried.
//! - Only GETs are retried, on transport errors, 429 and 5xx.
//! - Pull and push refuse to run without an API key. The connection test
//!   still runs and says the key is missing.
//! - Caller-supplied ids must match the FHIR id grammar and are pushed as
//!   single encoded path segments, never joined as relative URLs.
//!
//! Dropping any returned future drops its in-flight requests.

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clinical::{
    ClinicalRecord, CounselingPlanSummary, CounselingSession, EncounterSummary, Measurement, SubResource,
    SubResourceFailure, TreatmentCycle, TreatmentProcedure,
};
use crate::config::{ConfigStore, DEFAULT_EMR_TIMEOUT_MS, EmrProviderKind, EmrSettings};
use crate::error::{ErrorCode, TransportError, is_retryable_status};
use crate::fhir::care_plan::{COUNSELING_CATEGORY, CarePlanLinks, from_fhir_care_plan, to_fhir_care_plan};
use crate::fhir::cycle::{CYCLE_CATEGORY, from_fhir_cycle};
use crate::fhir::encounter::{summarize_encounter, to_fhir_encounter};
use crate::fhir::observation::{
    CATEGORY_LABORATORY, CYCLE_OUTCOME_CODE, ObservationLinks, from_fhir_observation, to_fhir_observations,
};
use crate::fhir::patient::from_fhir_patient;
use crate::fhir::procedure::from_fhir_treatment;
use crate::fhir::{
    FhirResource, LOCAL_CODE_SYSTEM, MappingError, Observation, Reference, bundle_resources, format_datetime,
};
use transport::{FhirMethod, FhirRequest, FhirResponse, FhirTransport, auth_headers};

/// Resource endpoints probed by [`EmrSyncClient::test_connection`].
pub const PROBED_RESOURCES: [&str; 6] = ["Patient", "Encounter", "Observation", "Procedure", "Appointment", "CarePlan"];

const SEARCH_PAGE_SIZE: &str = "100";
const RETRY_BASE_DELAY_MS: u64 = 100;
/// Longest error body kept for diagnostics.
const ERROR_BODY_LIMIT: usize = 2048;
const MAX_ID_LEN: usize = 64;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EmrError {
    #[error("EMR integration is disabled")]
    Disabled,

    #[error("EMR configuration error: {0}")]
    Configuration(String),

    #[error("invalid FHIR resource id: {0:?}")]
    InvalidId(String),

    #[error("EMR request for {resource} failed: {message}")]
    Transport { resource: String, message: String },

    #[error("EMR returned status {status} for {resource}")]
    Status { resource: String, status: u16, body: String },

    #[error("unreadable EMR response for {resource}: {message}")]
    Parse { resource: String, message: String },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for EmrError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Disabled => "E_EMR_DISABLED",
            Self::Configuration(_) => "E_EMR_CONFIGURATION",
            Self::InvalidId(_) => "E_EMR_INVALID_ID",
            Self::Transport { .. } => "E_EMR_UNAVAILABLE",
            Self::Status { .. } => "E_EMR_STATUS",
            Self::Parse { .. } => "E_EMR_PARSE",
            Self::Mapping(inner) => inner.error_code(),
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::Status { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

// =============================================================================
// RESULTS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    pub provider: EmrProviderKind,
    /// Resource types that answered without an error status.
    pub capabilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedResource {
    pub resource_type: String,
    pub id: String,
}

/// A secondary write that failed after the Encounter was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushWarning {
    pub resource: SubResource,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReceipt {
    /// Id of the created Encounter.
    pub record_id: String,
    pub partial: bool,
    pub created: Vec<CreatedResource>,
    pub warnings: Vec<PushWarning>,
}

// =============================================================================
// CONTEXT
// =============================================================================

/// Per-call view of the EMR settings.
struct EmrContext {
    base_url: reqwest::Url,
    headers: Vec<(String, String)>,
    timeout_ms: u64,
    retry_attempts: u32,
}

impl EmrContext {
    /// Context for reads and writes; an API key is required.
    fn new(settings: &EmrSettings) -> Result<Self, EmrError> {
        if !has_api_key(settings) {
            return Err(EmrError::Configuration("missing EMR API key".into()));
        }
        Self::unauthenticated(settings)
    }

    /// Context that tolerates a missing API key. Used by the connection test.
    fn unauthenticated(settings: &EmrSettings) -> Result<Self, EmrError> {
        let raw = settings
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| EmrError::Configuration("missing EMR base URL".into()))?;
        let base_url = reqwest::Url::parse(raw.trim_end_matches('/'))
            .map_err(|e| EmrError::Configuration(format!("invalid EMR base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(EmrError::Configuration(format!("invalid EMR base URL: {raw}")));
        }
        let timeout_ms = if settings.timeout_ms == 0 { DEFAULT_EMR_TIMEOUT_MS } else { settings.timeout_ms };
        Ok(Self {
            base_url,
            headers: auth_headers(settings),
            timeout_ms,
            retry_attempts: settings.retry_attempts,
        })
    }

    /// Base URL plus `segments`, each percent-encoded as a single path segment.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String, EmrError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| EmrError::Configuration(format!("invalid EMR base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    fn request(&self, method: FhirMethod, url: String, body: Option<Value>) -> FhirRequest {
        FhirRequest { method, url, headers: self.headers.clone(), body }
    }
}

// =============================================================================
// CLIENT
// =============================================================================

#[derive(Clone)]
pub struct EmrSyncClient {
    store: ConfigStore,
    transport: Arc<dyn FhirTransport>,
}

impl EmrSyncClient {
    #[must_use]
    pub fn new(store: ConfigStore, transport: Arc<dyn FhirTransport>) -> Self {
        Self { store, transport }
    }

    /// Probe each of [`PROBED_RESOURCES`] concurrently. Works while the
    /// integration is disabled so credentials can be checked first.
    ///
    /// # Errors
    ///
    /// Returns [`EmrError::Configuration`] when no usable base URL is set.
    /// Unreachable endpoints are reported in the result, not as errors.
    pub async fn test_connection(&self) -> Result<ConnectionReport, EmrError> {
        let config = self.store.get();
        let ctx = EmrContext::unauthenticated(&config.emr)?;

        let probes = PROBED_RESOURCES.iter().map(|&resource| {
            let ctx = &ctx;
            async move {
                let url = ctx.url(&[resource], &[("_count", "1")])?;
                let response = self.send_once(ctx, resource, &ctx.request(FhirMethod::Get, url, None)).await?;
                Ok::<_, EmrError>(response.status < 400)
            }
        });

        let mut capabilities = Vec::new();
        let mut last_error = None;
        for (&resource, outcome) in PROBED_RESOURCES.iter().zip(join_all(probes).await) {
            match outcome {
                Ok(true) => capabilities.push(resource.to_string()),
                Ok(false) => debug!(resource, "emr: probe returned error status"),
                Err(e) => {
                    debug!(resource, error = %e, "emr: probe failed");
                    last_error = Some(e);
                }
            }
        }

        let provider = config.emr.provider;
        let success = !capabilities.is_empty();
        let mut message = if success {
            format!(
                "Connected to {provider} EMR: {} of {} resource endpoints available",
                capabilities.len(),
                PROBED_RESOURCES.len()
            )
        } else {
            match last_error {
                Some(e) => format!("Could not reach {provider} EMR: {e}"),
                None => format!("{provider} EMR rejected every probe"),
            }
        };
        if !has_api_key(&config.emr) {
            message.push_str(" (no EMR API key configured; sync requests will be refused)");
        }
        info!(%provider, success, capabilities = capabilities.len(), "emr: connection test");
        Ok(ConnectionReport { success, message, provider, capabilities })
    }

    /// Fetch a patient and, best-effort, their clinical sub-resources.
    ///
    /// # Errors
    ///
    /// Fails only when the integration is disabled or misconfigured, or the
    /// Patient itself can't be read.
    pub async fn pull_patient(&self, patient_id: &str) -> Result<ClinicalRecord, EmrError> {
        let config = self.store.get();
        if !config.emr.enabled {
            return Err(EmrError::Disabled);
        }
        validate_id(patient_id)?;
        let ctx = EmrContext::new(&config.emr)?;
        let features = config.emr.features;

        let url = ctx.url(&["Patient", patient_id], &[])?;
        let response = self.get(&ctx, "Patient", url).await?;
        let patient = match parse_resource("Patient", &response.body)? {
            FhirResource::Patient(p) => p,
            other => {
                return Err(EmrError::Parse {
                    resource: "Patient".into(),
                    message: format!("expected Patient, got {}", other.resource_type()),
                });
            }
        };
        let mut patient = from_fhir_patient(&patient);
        if patient.id.is_empty() {
            patient.id = patient_id.to_string();
        }

        let cycle_category = format!("{LOCAL_CODE_SYSTEM}|{CYCLE_CATEGORY}");
        let counseling_category = format!("{LOCAL_CODE_SYSTEM}|{COUNSELING_CATEGORY}");
        let outcome_code = format!("{LOCAL_CODE_SYSTEM}|{CYCLE_OUTCOME_CODE}");

        let monitoring = async {
            if !features.sync_monitoring {
                return None;
            }
            let found = self
                .search(&ctx, "Observation", &[("patient", patient_id), ("category", CATEGORY_LABORATORY)])
                .await;
            Some(found.map(|r| measurements(&r)))
        };
        let outcomes = async {
            if !features.sync_outcomes {
                return None;
            }
            let found = self.search(&ctx, "Observation", &[("patient", patient_id), ("code", outcome_code.as_str())]).await;
            Some(found.map(|r| measurements(&r)))
        };
        let encounters = async {
            let found = self.search(&ctx, "Encounter", &[("patient", patient_id)]).await;
            Some(found.map(|r| encounter_summaries(&r)))
        };
        let cycles = async {
            if !features.sync_cycles {
                return None;
            }
            let found = self.search(&ctx, "CarePlan", &[("patient", patient_id), ("category", cycle_category.as_str())]).await;
            Some(found.map(|r| cycles_from(&r, patient_id)))
        };
        let counseling_plans = async {
            let found = self
                .search(
                    &ctx,
                    "CarePlan",
                    &[("patient", patient_id), ("category", counseling_category.as_str()), ("status", "active")],
                )
                .await;
            Some(found.map(|r| counseling_plans_from(&r)))
        };
        let procedures = async {
            if !features.sync_procedures {
                return None;
            }
            let found = self.search(&ctx, "Procedure", &[("patient", patient_id)]).await;
            Some(found.map(|r| procedures_from(&r, patient_id)))
        };

        let (monitoring, outcomes, encounters, cycles, counseling_plans, procedures) =
            futures::join!(monitoring, outcomes, encounters, cycles, counseling_plans, procedures);

        let mut failures = Vec::new();
        let record = ClinicalRecord {
            patient,
            monitoring: settle(SubResource::Monitoring, monitoring, &mut failures),
            outcomes: settle(SubResource::Outcomes, outcomes, &mut failures),
            encounters: settle(SubResource::Encounters, encounters, &mut failures),
            cycles: settle(SubResource::Cycles, cycles, &mut failures),
            counseling_plans: settle(SubResource::CounselingPlans, counseling_plans, &mut failures),
            procedures: settle(SubResource::Procedures, procedures, &mut failures),
            failures,
        };

        info!(patient_id, failures = record.failures.len(), "emr: pulled patient");
        Ok(record)
    }

    /// Write a counseling session as an Encounter plus linked Observations and CarePlan.
    ///
    /// # Errors
    ///
    /// - [`EmrError::Disabled`] / [`EmrError::Configuration`] before any request.
    /// - [`EmrError::Mapping`] when any part of the session can't be coded; nothing is sent.
    /// - Transport, status or parse errors from the Encounter create.
    ///
    /// Failures after the Encounter exists only mark the receipt partial.
    pub async fn push_counseling(&self, session: &CounselingSession) -> Result<PushReceipt, EmrError> {
        let config = self.store.get();
        if !config.emr.enabled {
            return Err(EmrError::Disabled);
        }
        let ctx = EmrContext::new(&config.emr)?;
        let features = config.emr.features;

        let encounter = to_fhir_encounter(session)?;
        let obs_links = ObservationLinks {
            patient_id: session.patient_id.clone(),
            encounter_id: None,
            effective: Some(format_datetime("Observation.effectiveDateTime", session.session_date)?),
        };
        let mut secondary: Vec<(SubResource, FhirResource)> = Vec::new();
        if features.push_ai_analysis {
            if let Some(analysis) = &session.ai_analysis {
                secondary.extend(observations(SubResource::AiAnalysis, to_fhir_observations(analysis, &obs_links)?));
            }
        }
        if features.push_assessments {
            if let Some(scores) = &session.assessment_scores {
                secondary.extend(observations(SubResource::Assessments, to_fhir_observations(scores, &obs_links)?));
            }
        }
        if features.push_care_plan {
            if let Some(plan) = &session.intervention_plan {
                let links = CarePlanLinks { patient_id: session.patient_id.clone(), encounter_id: None };
                secondary.push((SubResource::CarePlan, FhirResource::CarePlan(to_fhir_care_plan(plan, &links))));
            }
        }

        let record_id = self.create(&ctx, &FhirResource::Encounter(encounter)).await?;
        info!(session_id = %session.id, encounter_id = %record_id, pending = secondary.len(), "emr: encounter created");

        let writes = secondary.into_iter().map(|(kind, mut resource)| {
            link_encounter(&mut resource, &record_id);
            let ctx = &ctx;
            async move {
                let result = self.create(ctx, &resource).await;
                (kind, resource.resource_type(), result)
            }
        });

        let mut created = vec![CreatedResource { resource_type: "Encounter".into(), id: record_id.clone() }];
        let mut warnings = Vec::new();
        for (kind, resource_type, result) in join_all(writes).await {
            match result {
                Ok(id) => created.push(CreatedResource { resource_type: resource_type.into(), id }),
                Err(e) => {
                    warn!(encounter_id = %record_id, resource = resource_type, error = %e, "emr: secondary write failed");
                    warnings.push(PushWarning { resource: kind, message: e.to_string() });
                }
            }
        }

        let partial = !warnings.is_empty();
        info!(encounter_id = %record_id, created = created.len(), partial, "emr: counseling pushed");
        Ok(PushReceipt { record_id, partial, created, warnings })
    }

    // =========================================================================
    // HTTP
    // =========================================================================

    async fn search(&self, ctx: &EmrContext, resource: &str, query: &[(&str, &str)]) -> Result<Vec<FhirResource>, EmrError> {
        let mut params = query.to_vec();
        params.push(("_count", SEARCH_PAGE_SIZE));
        let url = ctx.url(&[resource], &params)?;
        let response = self.get(ctx, resource, url).await?;
        let bundle: Value = serde_json::from_str(&response.body).map_err(|e| EmrError::Parse {
            resource: resource.to_string(),
            message: e.to_string(),
        })?;
        Ok(bundle_resources(&bundle))
    }

    /// GET with retries on transport errors, 429 and 5xx. Other statuses fail immediately.
    async fn get(&self, ctx: &EmrContext, resource: &str, url: String) -> Result<FhirResponse, EmrError> {
        let request = ctx.request(FhirMethod::Get, url, None);
        let mut attempt = 0;
        loop {
            let result = self.send_once(ctx, resource, &request).await.and_then(|r| require_success(resource, r));
            match result {
                Err(e) if e.retryable() && attempt < ctx.retry_attempts => {
                    let delay = RETRY_BASE_DELAY_MS << attempt.min(6);
                    debug!(resource, attempt, delay_ms = delay, error = %e, "emr: retrying");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// POST a resource; returns the id the EMR assigned.
    async fn create(&self, ctx: &EmrContext, resource: &FhirResource) -> Result<String, EmrError> {
        let kind = resource.resource_type();
        let body = serde_json::to_value(resource).map_err(|e| EmrError::Parse {
            resource: kind.to_string(),
            message: e.to_string(),
        })?;
        let request = ctx.request(FhirMethod::Post, ctx.url(&[kind], &[])?, Some(body));
        let response = require_success(kind, self.send_once(ctx, kind, &request).await?)?;
        created_id(kind, &response)
    }

    async fn send_once(&self, ctx: &EmrContext, resource: &str, request: &FhirRequest) -> Result<FhirResponse, EmrError> {
        debug!(method = %request.method, resource, "emr: request");
        let sent = tokio::time::timeout(Duration::from_millis(ctx.timeout_ms), self.transport.send(request)).await;
        sent.unwrap_or(Err(TransportError::Timeout(ctx.timeout_ms)))
            .map_err(|e| EmrError::Transport { resource: resource.to_string(), message: e.to_string() })
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn has_api_key(settings: &EmrSettings) -> bool {
    settings.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
}

/// FHIR id grammar: 1-64 of `[A-Za-z0-9.-]`, and not a dot segment.
fn validate_id(id: &str) -> Result<(), EmrError> {
    let valid = (1..=MAX_ID_LEN).contains(&id.len())
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.')
        && id != "."
        && id != "..";
    if valid { Ok(()) } else { Err(EmrError::InvalidId(id.to_string())) }
}

fn require_success(resource: &str, response: FhirResponse) -> Result<FhirResponse, EmrError> {
    if response.is_success() {
        return Ok(response);
    }
    let mut body = response.body;
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(EmrError::Status { resource: resource.to_string(), status: response.status, body })
}

fn parse_resource(resource: &str, body: &str) -> Result<FhirResource, EmrError> {
    serde_json::from_str(body).map_err(|e| EmrError::Parse { resource: resource.to_string(), message: e.to_string() })
}

/// Id from the response body, else from the `Location` header.
fn created_id(resource: &str, response: &FhirResponse) -> Result<String, EmrError> {
    let from_body = serde_json::from_str::<Value>(&response.body)
        .ok()
        .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string));
    let from_location = || {
        response.location.as_deref().and_then(|loc| {
            Reference { reference: Some(loc.to_string()), display: None }
                .id_of(resource)
                .map(str::to_string)
        })
    };
    from_body.or_else(from_location).ok_or_else(|| EmrError::Parse {
        resource: resource.to_string(),
        message: "create response has no id".into(),
    })
}

fn observations(kind: SubResource, list: Vec<Observation>) -> impl Iterator<Item = (SubResource, FhirResource)> {
    list.into_iter().map(move |o| (kind, FhirResource::Observation(o)))
}

fn link_encounter(resource: &mut FhirResource, encounter_id: &str) {
    let reference = Some(Reference::to("Encounter", encounter_id));
    match resource {
        FhirResource::Observation(o) => o.encounter = reference,
        FhirResource::CarePlan(c) => c.encounter = reference,
        FhirResource::Patient(_) | FhirResource::Encounter(_) | FhirResource::Procedure(_) => {}
    }
}

/// Fold one best-effort fetch into the record.
fn settle<T>(
    resource: SubResource,
    fetched: Option<Result<T, EmrError>>,
    failures: &mut Vec<SubResourceFailure>,
) -> Option<T> {
    match fetched? {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(?resource, error = %e, "emr: sub-resource fetch failed");
            failures.push(SubResourceFailure { resource, error: e.to_string() });
            None
        }
    }
}

fn measurements(resources: &[FhirResource]) -> Vec<Measurement> {
    resources
        .iter()
        .filter_map(|r| match r {
            FhirResource::Observation(o) => from_fhir_observation(o),
            _ => None,
        })
        .collect()
}

fn encounter_summaries(resources: &[FhirResource]) -> Vec<EncounterSummary> {
    resources
        .iter()
        .filter_map(|r| match r {
            FhirResource::Encounter(e) => Some(summarize_encounter(e)),
            _ => None,
        })
        .collect()
}

fn cycles_from(resources: &[FhirResource], patient_id: &str) -> Vec<TreatmentCycle> {
    resources
        .iter()
        .filter_map(|r| match r {
            FhirResource::CarePlan(c) if c.has_category(CYCLE_CATEGORY) => Some(from_fhir_cycle(c, patient_id)),
            _ => None,
        })
        .collect()
}

fn counseling_plans_from(resources: &[FhirResource]) -> Vec<CounselingPlanSummary> {
    resources
        .iter()
        .filter_map(|r| match r {
            FhirResource::CarePlan(c) if c.has_category(COUNSELING_CATEGORY) => Some(from_fhir_care_plan(c)),
            _ => None,
        })
        .collect()
}

fn procedures_from(resources: &[FhirResource], patient_id: &str) -> Vec<TreatmentProcedure> {
    resources
        .iter()
        .filter_map(|r| match r {
            FhirResource::Procedure(p) => Some(from_fhir_treatment(p, patient_id)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
