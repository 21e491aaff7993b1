//! Integration configuration: typed settings plus a snapshot store.
//!
//! DESIGN
//! ======
//! `ConfigStore` holds an `Arc<IntegrationConfig>` behind a lock. Readers
//! clone the `Arc` once at the start of an operation and keep that
//! snapshot for the whole call; `update` builds a fresh config, swaps the
//! pointer, and never mutates a snapshot someone else holds. Last write
//! wins.
//!
//! Saves are serialized behind an async lock and only ever move the
//! persisted version forward. A writer that loses the race finds a newer
//! snapshot already saved and skips its own, so the stored file always
//! ends on the latest version.
//!
//! No provider-specific validation happens here. Saving credentials
//! before enabling an integration is normal; the gateway and EMR client
//! check required fields when they actually need them.

pub mod persistence;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::llm::provider::ProviderId;
pub use persistence::{ConfigPersistence, JsonFilePersistence, NoopPersistence};

pub const DEFAULT_AI_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_AI_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_AI_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_EMR_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_EMR_RETRY_ATTEMPTS: u32 = 2;

/// Shown in place of stored credentials on read paths.
pub const REDACTED: &str = "********";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be parsed.
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    /// Reading or writing the persisted config failed.
    #[error("config io failed: {0}")]
    Io(String),
}

impl crate::error::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigParse(_) => "E_CONFIG_PARSE",
            Self::Io(_) => "E_CONFIG_IO",
        }
    }
}

// =============================================================================
// AI SETTINGS
// =============================================================================

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
    pub enabled: bool,
    pub provider: ProviderId,
    pub api_key: Option<String>,
    /// Empty means the provider profile's default model.
    pub model: Option<String>,
    /// Overrides the profile endpoint. Required for `custom`.
    pub endpoint: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// `0` means [`DEFAULT_AI_TIMEOUT_MS`].
    pub timeout_ms: u64,
    pub enable_fallback: bool,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: ProviderId::Mock,
            api_key: None,
            model: None,
            endpoint: None,
            temperature: DEFAULT_AI_TEMPERATURE,
            max_tokens: DEFAULT_AI_MAX_TOKENS,
            timeout_ms: DEFAULT_AI_TIMEOUT_MS,
            enable_fallback: true,
        }
    }
}

impl fmt::Debug for AiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AiSettings")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_ms", &self.timeout_ms)
            .field("enable_fallback", &self.enable_fallback)
            .finish()
    }
}

// =============================================================================
// EMR SETTINGS
// =============================================================================

/// EMR vendor. All speak FHIR R4; they differ only in auth header extras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmrProviderKind {
    Epic,
    Cerner,
    Athena,
    Allscripts,
    #[default]
    Fhir,
}

impl EmrProviderKind {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "epic" => Ok(Self::Epic),
            "cerner" => Ok(Self::Cerner),
            "athena" => Ok(Self::Athena),
            "allscripts" => Ok(Self::Allscripts),
            "fhir" | "generic" => Ok(Self::Fhir),
            other => Err(ConfigError::ConfigParse(format!("unknown EMR_PROVIDER: {other}"))),
        }
    }
}

impl fmt::Display for EmrProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Epic => "epic",
            Self::Cerner => "cerner",
            Self::Athena => "athena",
            Self::Allscripts => "allscripts",
            Self::Fhir => "fhir",
        })
    }
}

/// Per-category switches for IVF data sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[allow(clippy::struct_excessive_bools)]
pub struct EmrFeatures {
    pub sync_cycles: bool,
    pub sync_monitoring: bool,
    pub sync_outcomes: bool,
    pub sync_procedures: bool,
    pub push_ai_analysis: bool,
    pub push_assessments: bool,
    pub push_care_plan: bool,
}

impl Default for EmrFeatures {
    fn default() -> Self {
        Self {
            sync_cycles: true,
            sync_monitoring: true,
            sync_outcomes: true,
            sync_procedures: true,
            push_ai_analysis: true,
            push_assessments: true,
            push_care_plan: true,
        }
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmrSettings {
    pub enabled: bool,
    pub provider: EmrProviderKind,
    /// FHIR base, e.g. `https://fhir.example.org/R4`.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    /// `0` means [`DEFAULT_EMR_TIMEOUT_MS`].
    pub timeout_ms: u64,
    /// Extra attempts for idempotent reads.
    pub retry_attempts: u32,
    pub features: EmrFeatures,
}

impl Default for EmrSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: EmrProviderKind::Fhir,
            base_url: None,
            api_key: None,
            client_id: None,
            timeout_ms: DEFAULT_EMR_TIMEOUT_MS,
            retry_attempts: DEFAULT_EMR_RETRY_ATTEMPTS,
            features: EmrFeatures::default(),
        }
    }
}

impl fmt::Debug for EmrSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmrSettings")
            .field("enabled", &self.enabled)
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("client_id", &self.client_id)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry_attempts", &self.retry_attempts)
            .field("features", &self.features)
            .finish()
    }
}

// =============================================================================
// INTEGRATION CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegrationConfig {
    /// Bumped on every successful update.
    pub version: u64,
    pub ai: AiSettings,
    pub emr: EmrSettings,
}

impl IntegrationConfig {
    /// Build config from environment variables, starting from safe defaults.
    ///
    /// AI: `AI_ENABLED`, `AI_PROVIDER`, `AI_API_KEY`, `AI_MODEL`,
    /// `AI_ENDPOINT`, `AI_TEMPERATURE`, `AI_MAX_TOKENS`, `AI_TIMEOUT_MS`,
    /// `AI_ENABLE_FALLBACK`.
    ///
    /// EMR: `EMR_ENABLED`, `EMR_PROVIDER`, `EMR_BASE_URL`, `EMR_API_KEY`,
    /// `EMR_CLIENT_ID`, `EMR_TIMEOUT_MS`, `EMR_RETRY_ATTEMPTS`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigParse`] for an unknown provider name.
    /// Unparseable numbers and booleans fall back to their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let ai_defaults = AiSettings::default();
        let provider = match env_text("AI_PROVIDER") {
            Some(raw) => raw.parse::<ProviderId>().map_err(ConfigError::ConfigParse)?,
            None => ai_defaults.provider,
        };
        let ai = AiSettings {
            enabled: env_parse("AI_ENABLED", ai_defaults.enabled),
            provider,
            api_key: env_text("AI_API_KEY"),
            model: env_text("AI_MODEL"),
            endpoint: env_text("AI_ENDPOINT").map(|url| url.trim_end_matches('/').to_string()),
            temperature: env_parse("AI_TEMPERATURE", ai_defaults.temperature),
            max_tokens: env_parse("AI_MAX_TOKENS", ai_defaults.max_tokens),
            timeout_ms: env_parse("AI_TIMEOUT_MS", ai_defaults.timeout_ms),
            enable_fallback: env_parse("AI_ENABLE_FALLBACK", ai_defaults.enable_fallback),
        };

        let emr_defaults = EmrSettings::default();
        let emr_provider = match env_text("EMR_PROVIDER") {
            Some(raw) => EmrProviderKind::parse(&raw)?,
            None => emr_defaults.provider,
        };
        let emr = EmrSettings {
            enabled: env_parse("EMR_ENABLED", emr_defaults.enabled),
            provider: emr_provider,
            base_url: env_text("EMR_BASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            api_key: env_text("EMR_API_KEY"),
            client_id: env_text("EMR_CLIENT_ID"),
            timeout_ms: env_parse("EMR_TIMEOUT_MS", emr_defaults.timeout_ms),
            retry_attempts: env_parse("EMR_RETRY_ATTEMPTS", emr_defaults.retry_attempts),
            features: emr_defaults.features,
        };

        Ok(Self { version: 0, ai, emr })
    }

    /// Copy with credentials masked, for read APIs.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.ai.api_key.is_some() {
            copy.ai.api_key = Some(REDACTED.to_string());
        }
        if copy.emr.api_key.is_some() {
            copy.emr.api_key = Some(REDACTED.to_string());
        }
        copy
    }

    fn apply(&mut self, patch: ConfigPatch) {
        if let Some(ai) = patch.ai {
            ai.apply_to(&mut self.ai);
        }
        if let Some(emr) = patch.emr {
            emr.apply_to(&mut self.emr);
        }
    }
}

fn env_text(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

// =============================================================================
// PATCHES
// =============================================================================

/// Partial update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    pub ai: Option<AiPatch>,
    pub emr: Option<EmrPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiPatch {
    pub enabled: Option<bool>,
    pub provider: Option<ProviderId>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
    pub enable_fallback: Option<bool>,
}

impl AiPatch {
    fn apply_to(self, ai: &mut AiSettings) {
        set(&mut ai.enabled, self.enabled);
        set(&mut ai.provider, self.provider);
        set_secret(&mut ai.api_key, self.api_key);
        set_text(&mut ai.model, self.model);
        set_text(&mut ai.endpoint, self.endpoint);
        set(&mut ai.temperature, self.temperature);
        set(&mut ai.max_tokens, self.max_tokens);
        set(&mut ai.timeout_ms, self.timeout_ms);
        set(&mut ai.enable_fallback, self.enable_fallback);
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmrPatch {
    pub enabled: Option<bool>,
    pub provider: Option<EmrProviderKind>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub client_id: Option<String>,
    pub timeout_ms: Option<u64>,
    pub retry_attempts: Option<u32>,
    /// Replaces the whole feature set when present.
    pub features: Option<EmrFeatures>,
}

impl EmrPatch {
    fn apply_to(self, emr: &mut EmrSettings) {
        set(&mut emr.enabled, self.enabled);
        set(&mut emr.provider, self.provider);
        set_text(&mut emr.base_url, self.base_url.map(|url| url.trim_end_matches('/').to_string()));
        set_secret(&mut emr.api_key, self.api_key);
        set_text(&mut emr.client_id, self.client_id);
        set(&mut emr.timeout_ms, self.timeout_ms);
        set(&mut emr.retry_attempts, self.retry_attempts);
        set(&mut emr.features, self.features);
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Blank strings clear the field.
fn set_text(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value {
        let trimmed = value.trim();
        *target = if trimmed.is_empty() { None } else { Some(trimmed.to_string()) };
    }
}

/// Like [`set_text`], but echoing the redaction marker back keeps the stored secret.
fn set_secret(target: &mut Option<String>, value: Option<String>) {
    if value.as_deref() == Some(REDACTED) {
        return;
    }
    set_text(target, value);
}

// =============================================================================
// STORE
// =============================================================================

/// Process-wide config holder. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConfigStore {
    current: Arc<RwLock<Arc<IntegrationConfig>>>,
    persistence: Arc<dyn ConfigPersistence>,
    /// Highest version handed to `persistence` successfully.
    saved_version: Arc<tokio::sync::Mutex<u64>>,
}

impl ConfigStore {
    #[must_use]
    pub fn new(initial: IntegrationConfig, persistence: Arc<dyn ConfigPersistence>) -> Self {
        let saved_version = Arc::new(tokio::sync::Mutex::new(initial.version));
        Self { current: Arc::new(RwLock::new(Arc::new(initial))), persistence, saved_version }
    }

    /// Store without a persistence collaborator.
    #[must_use]
    pub fn in_memory(initial: IntegrationConfig) -> Self {
        Self::new(initial, Arc::new(NoopPersistence))
    }

    /// Current snapshot. Later updates never alter the returned value.
    #[must_use]
    pub fn get(&self) -> Arc<IntegrationConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Shallow-merge `patch` into the current config and swap it in.
    ///
    /// Persistence failures are logged; the in-process update still stands.
    pub async fn update(&self, patch: ConfigPatch) -> Arc<IntegrationConfig> {
        let next = {
            let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let mut next = IntegrationConfig::clone(&guard);
            next.apply(patch);
            next.version = guard.version + 1;
            let next = Arc::new(next);
            *guard = Arc::clone(&next);
            next
        };

        info!(
            version = next.version,
            ai_enabled = next.ai.enabled,
            ai_provider = %next.ai.provider,
            emr_enabled = next.emr.enabled,
            "config: updated"
        );

        self.persist_latest().await;
        next
    }

    async fn persist_latest(&self) {
        let mut saved = self.saved_version.lock().await;
        let latest = self.get();
        if latest.version <= *saved {
            debug!(version = latest.version, saved = *saved, "config: newer snapshot already persisted");
            return;
        }
        match self.persistence.save(&latest).await {
            Ok(()) => *saved = latest.version,
            Err(e) => warn!(error = %e, version = latest.version, "config: persist failed"),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
