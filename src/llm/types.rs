//! Gateway types: analysis requests, structured results and errors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::ProviderId;
use crate::clinical::{MeasurementValue, Measurements};
use crate::config::AiSettings;

pub const CONTEXT_PLACEHOLDER: &str = "{{context}}";

pub const DEFAULT_PROMPT_TEMPLATE: &str = "You are a fertility counseling specialist. Using the patient \
context below, build a psychological persona and a phased counseling intervention plan for a patient \
undergoing fertility treatment.\n\nPatient context:\n{{context}}";

const FORMAT_INSTRUCTION: &str = "Respond with a single JSON object and no other text. It must have two keys: \
\"persona\" (patientName, psychologicalProfile {stressLevel, anxietyLevel, copingStyle, emotionalState, \
supportSystem}, personalityTraits[], motivationalFactors[], primaryConcerns[], communicationPreferences[], \
summary) and \"interventionPlan\" (title, goals[], phases[{name, durationWeeks, focus, activities[]}], \
strategies[{name, description, frequency}], followUp).";

// =============================================================================
// ERROR
// =============================================================================

/// Errors the gateway surfaces to callers. Everything else becomes a fallback.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// A credential or endpoint required by the selected provider is missing.
    #[error("AI configuration error: {0}")]
    Configuration(String),

    /// Transport failure or timeout with fallback disabled.
    #[error("AI provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: ProviderId, message: String },

    /// Non-2xx status with fallback disabled.
    #[error("AI provider {provider} returned status {status}")]
    ProviderError { provider: ProviderId, status: u16, body: String },

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "E_AI_CONFIGURATION",
            Self::ProviderUnavailable { .. } => "E_PROVIDER_UNAVAILABLE",
            Self::ProviderError { .. } => "E_PROVIDER_ERROR",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::ProviderUnavailable { .. } => true,
            Self::ProviderError { status, .. } => crate::error::is_retryable_status(*status),
            Self::Configuration(_) | Self::HttpClientBuild(_) => false,
        }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// One analysis call. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Opaque patient data; only read by the prompt and the fallback generator.
    pub subject_context: Value,
    pub prompt_template: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// `0` defers to the configured timeout.
    pub timeout_ms: u64,
}

impl AnalysisRequest {
    /// Request with the default template and tunables taken from `settings`.
    #[must_use]
    pub fn new(subject_context: Value, settings: &AiSettings) -> Self {
        Self {
            subject_context,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_tokens,
            timeout_ms: settings.timeout_ms,
        }
    }

    /// Final prompt text: template with context substituted, plus the JSON format instruction.
    #[must_use]
    pub fn render_prompt(&self) -> String {
        let context = serde_json::to_string_pretty(&self.subject_context).unwrap_or_else(|_| "{}".to_string());
        let template = if self.prompt_template.trim().is_empty() {
            DEFAULT_PROMPT_TEMPLATE
        } else {
            self.prompt_template.as_str()
        };
        let body = if template.contains(CONTEXT_PLACEHOLDER) {
            template.replace(CONTEXT_PLACEHOLDER, &context)
        } else {
            format!("{template}\n\nPatient context:\n{context}")
        };
        format!("{body}\n\n{FORMAT_INSTRUCTION}")
    }
}

// =============================================================================
// PERSONA
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PsychologicalProfile {
    pub stress_level: String,
    pub anxiety_level: String,
    pub coping_style: String,
    pub emotional_state: String,
    pub support_system: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonaResult {
    pub patient_name: String,
    pub psychological_profile: PsychologicalProfile,
    pub personality_traits: Vec<String>,
    pub motivational_factors: Vec<String>,
    pub primary_concerns: Vec<String>,
    pub communication_preferences: Vec<String>,
    pub summary: String,
}

impl PersonaResult {
    /// Profile fields as EMR observation inputs.
    #[must_use]
    pub fn analysis_measurements(&self) -> Measurements {
        let profile = &self.psychological_profile;
        BTreeMap::from([
            ("stressLevel".to_string(), MeasurementValue::Text(profile.stress_level.clone())),
            ("anxietyLevel".to_string(), MeasurementValue::Text(profile.anxiety_level.clone())),
            ("copingStyle".to_string(), MeasurementValue::Text(profile.coping_style.clone())),
            ("emotionalState".to_string(), MeasurementValue::Text(profile.emotional_state.clone())),
            ("supportSystem".to_string(), MeasurementValue::Text(profile.support_system.clone())),
        ])
    }
}

// =============================================================================
// INTERVENTION PLAN
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPhase {
    pub name: String,
    pub duration_weeks: u32,
    pub focus: String,
    pub activities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounselingStrategy {
    pub name: String,
    pub description: String,
    pub frequency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPlanResult {
    pub title: String,
    pub goals: Vec<String>,
    pub phases: Vec<InterventionPhase>,
    pub strategies: Vec<CounselingStrategy>,
    pub follow_up: String,
}

// =============================================================================
// OUTCOME
// =============================================================================

/// Why the deterministic generator produced the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FallbackReason {
    Disabled,
    MockProvider,
    #[serde(rename_all = "camelCase")]
    Timeout { after_ms: u64 },
    Transport { message: String },
    HttpStatus { status: u16 },
    EmptyContent,
    InvalidJson,
    MissingSections,
    InvalidShape { message: String },
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("integration disabled"),
            Self::MockProvider => f.write_str("mock provider selected"),
            Self::Timeout { after_ms } => write!(f, "timed out after {after_ms} ms"),
            Self::Transport { message } => write!(f, "transport failed: {message}"),
            Self::HttpStatus { status } => write!(f, "provider returned status {status}"),
            Self::EmptyContent => f.write_str("provider returned no text"),
            Self::InvalidJson => f.write_str("provider text is not JSON"),
            Self::MissingSections => f.write_str("provider JSON lacks a persona"),
            Self::InvalidShape { message } => write!(f, "provider JSON has the wrong shape: {message}"),
        }
    }
}

/// Where the result came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AnalysisSource {
    /// Parsed provider output. `filled_fields` lists dotted paths completed by the generator.
    #[serde(rename_all = "camelCase")]
    Provider { provider: ProviderId, filled_fields: Vec<String> },
    Fallback { reason: FallbackReason },
}

/// Gateway result. Both sections are always fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    pub persona: PersonaResult,
    pub intervention_plan: InterventionPlanResult,
    pub source: AnalysisSource,
}

impl AnalysisOutcome {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, AnalysisSource::Fallback { .. })
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
