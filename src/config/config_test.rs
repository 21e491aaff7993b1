use super::*;
use std::sync::Mutex;

/// Serializes tests that touch process env.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const ENV_KEYS: &[&str] = &[
    "AI_ENABLED",
    "AI_PROVIDER",
    "AI_API_KEY",
    "AI_MODEL",
    "AI_ENDPOINT",
    "AI_TEMPERATURE",
    "AI_MAX_TOKENS",
    "AI_TIMEOUT_MS",
    "AI_ENABLE_FALLBACK",
    "EMR_ENABLED",
    "EMR_PROVIDER",
    "EMR_BASE_URL",
    "EMR_API_KEY",
    "EMR_CLIENT_ID",
    "EMR_TIMEOUT_MS",
    "EMR_RETRY_ATTEMPTS",
];

/// # Safety
/// Callers must hold `ENV_LOCK`.
unsafe fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

struct FailingPersistence;

#[async_trait::async_trait]
impl ConfigPersistence for FailingPersistence {
    async fn load(&self) -> Result<Option<IntegrationConfig>, ConfigError> {
        Ok(None)
    }

    async fn save(&self, _config: &IntegrationConfig) -> Result<(), ConfigError> {
        Err(ConfigError::Io("disk full".into()))
    }
}

/// Records saved versions; the first save is slow so a later one can overtake it.
#[derive(Default)]
struct SlowFirstPersistence {
    versions: Mutex<Vec<u64>>,
    calls: std::sync::atomic::AtomicUsize,
}

#[async_trait::async_trait]
impl ConfigPersistence for SlowFirstPersistence {
    async fn load(&self) -> Result<Option<IntegrationConfig>, ConfigError> {
        Ok(None)
    }

    async fn save(&self, config: &IntegrationConfig) -> Result<(), ConfigError> {
        if self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        self.versions.lock().unwrap().push(config.version);
        Ok(())
    }
}

struct RecordingPersistence {
    saved: Mutex<Vec<IntegrationConfig>>,
}

#[async_trait::async_trait]
impl ConfigPersistence for RecordingPersistence {
    async fn load(&self) -> Result<Option<IntegrationConfig>, ConfigError> {
        Ok(self.saved.lock().unwrap().last().cloned())
    }

    async fn save(&self, config: &IntegrationConfig) -> Result<(), ConfigError> {
        self.saved.lock().unwrap().push(config.clone());
        Ok(())
    }
}

// =========================================================================
// defaults + env
// =========================================================================

#[test]
fn defaults_are_safe() {
    let cfg = IntegrationConfig::default();
    assert!(!cfg.ai.enabled);
    assert_eq!(cfg.ai.provider, ProviderId::Mock);
    assert!(cfg.ai.enable_fallback);
    assert!(cfg.ai.api_key.is_none());
    assert!(!cfg.emr.enabled);
    assert_eq!(cfg.emr.provider, EmrProviderKind::Fhir);
    assert_eq!(cfg.emr.retry_attempts, DEFAULT_EMR_RETRY_ATTEMPTS);
    assert!(cfg.emr.features.sync_monitoring);
}

#[test]
fn from_env_without_vars_matches_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe { clear_env() };

    let cfg = IntegrationConfig::from_env().unwrap();
    assert_eq!(cfg, IntegrationConfig::default());
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe {
        clear_env();
        std::env::set_var("AI_ENABLED", "true");
        std::env::set_var("AI_PROVIDER", "groq");
        std::env::set_var("AI_API_KEY", "gsk-test");
        std::env::set_var("AI_ENDPOINT", "https://proxy.test/v1/");
        std::env::set_var("AI_TIMEOUT_MS", "5000");
        std::env::set_var("AI_TEMPERATURE", "not-a-number");
        std::env::set_var("EMR_PROVIDER", "epic");
        std::env::set_var("EMR_BASE_URL", "https://fhir.test/R4/");
        std::env::set_var("EMR_RETRY_ATTEMPTS", "0");
    }

    let cfg = IntegrationConfig::from_env().unwrap();
    assert!(cfg.ai.enabled);
    assert_eq!(cfg.ai.provider, ProviderId::Groq);
    assert_eq!(cfg.ai.api_key.as_deref(), Some("gsk-test"));
    assert_eq!(cfg.ai.endpoint.as_deref(), Some("https://proxy.test/v1"));
    assert_eq!(cfg.ai.timeout_ms, 5000);
    assert!((cfg.ai.temperature - DEFAULT_AI_TEMPERATURE).abs() < f32::EPSILON);
    assert_eq!(cfg.emr.provider, EmrProviderKind::Epic);
    assert_eq!(cfg.emr.base_url.as_deref(), Some("https://fhir.test/R4"));
    assert_eq!(cfg.emr.retry_attempts, 0);

    unsafe { clear_env() };
}

#[test]
fn from_env_unknown_provider_errors() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
    unsafe {
        clear_env();
        std::env::set_var("AI_PROVIDER", "watson");
    }

    let err = IntegrationConfig::from_env().unwrap_err().to_string();
    assert!(err.contains("unknown AI provider"));

    unsafe { clear_env() };
}

#[test]
fn debug_output_hides_api_keys() {
    let mut cfg = IntegrationConfig::default();
    cfg.ai.api_key = Some("sk-super-secret".into());
    cfg.emr.api_key = Some("emr-super-secret".into());
    let rendered = format!("{cfg:?}");
    assert!(!rendered.contains("super-secret"));
    assert!(rendered.contains(REDACTED));
}

#[test]
fn redacted_masks_only_present_keys() {
    let mut cfg = IntegrationConfig::default();
    cfg.ai.api_key = Some("sk-live".into());
    let redacted = cfg.redacted();
    assert_eq!(redacted.ai.api_key.as_deref(), Some(REDACTED));
    assert!(redacted.emr.api_key.is_none());
}

// =========================================================================
// store
// =========================================================================

#[tokio::test]
async fn update_merges_shallowly_and_bumps_version() {
    let store = ConfigStore::in_memory(IntegrationConfig::default());
    let patch = ConfigPatch {
        ai: Some(AiPatch { provider: Some(ProviderId::Groq), api_key: Some("gsk".into()), ..AiPatch::default() }),
        emr: None,
    };

    let next = store.update(patch).await;
    assert_eq!(next.version, 1);
    assert_eq!(next.ai.provider, ProviderId::Groq);
    assert_eq!(next.ai.api_key.as_deref(), Some("gsk"));
    // Untouched fields keep their values.
    assert!(!next.ai.enabled);
    assert!(next.ai.enable_fallback);
    assert_eq!(next.emr, EmrSettings::default());
}

#[tokio::test]
async fn snapshot_is_unaffected_by_later_update() {
    let store = ConfigStore::in_memory(IntegrationConfig::default());
    let before = store.get();

    store
        .update(ConfigPatch {
            ai: Some(AiPatch { enabled: Some(true), ..AiPatch::default() }),
            emr: None,
        })
        .await;

    assert!(!before.ai.enabled);
    assert_eq!(before.version, 0);
    assert!(store.get().ai.enabled);
}

#[tokio::test]
async fn saving_incomplete_config_is_not_an_error() {
    let store = ConfigStore::in_memory(IntegrationConfig::default());
    let next = store
        .update(ConfigPatch {
            ai: Some(AiPatch { enabled: Some(true), provider: Some(ProviderId::Custom), ..AiPatch::default() }),
            emr: Some(EmrPatch { enabled: Some(true), ..EmrPatch::default() }),
        })
        .await;
    assert!(next.ai.enabled);
    assert!(next.ai.endpoint.is_none());
    assert!(next.emr.base_url.is_none());
}

#[tokio::test]
async fn blank_text_clears_and_redaction_marker_keeps_secret() {
    let mut initial = IntegrationConfig::default();
    initial.ai.api_key = Some("sk-live".into());
    initial.ai.model = Some("gpt-4o".into());
    let store = ConfigStore::in_memory(initial);

    let next = store
        .update(ConfigPatch {
            ai: Some(AiPatch { api_key: Some(REDACTED.into()), model: Some("  ".into()), ..AiPatch::default() }),
            emr: None,
        })
        .await;
    assert_eq!(next.ai.api_key.as_deref(), Some("sk-live"));
    assert!(next.ai.model.is_none());
}

#[tokio::test]
async fn update_hands_snapshot_to_persistence() {
    let persistence = Arc::new(RecordingPersistence { saved: Mutex::new(Vec::new()) });
    let store = ConfigStore::new(IntegrationConfig::default(), persistence.clone());

    store
        .update(ConfigPatch { ai: None, emr: Some(EmrPatch { retry_attempts: Some(5), ..EmrPatch::default() }) })
        .await;

    let saved = persistence.load().await.unwrap().unwrap();
    assert_eq!(saved.version, 1);
    assert_eq!(saved.emr.retry_attempts, 5);
}

#[tokio::test]
async fn persistence_failure_does_not_fail_update() {
    let store = ConfigStore::new(IntegrationConfig::default(), Arc::new(FailingPersistence));
    let next = store
        .update(ConfigPatch {
            ai: Some(AiPatch { max_tokens: Some(900), ..AiPatch::default() }),
            emr: None,
        })
        .await;
    assert_eq!(next.ai.max_tokens, 900);
    assert_eq!(store.get().ai.max_tokens, 900);
}

#[tokio::test]
async fn concurrent_updates_persist_in_version_order() {
    let persistence = Arc::new(SlowFirstPersistence::default());
    let store = ConfigStore::new(IntegrationConfig::default(), persistence.clone());
    let retries = |n| ConfigPatch { ai: None, emr: Some(EmrPatch { retry_attempts: Some(n), ..EmrPatch::default() }) };

    let (first, second) = tokio::join!(store.update(retries(4)), store.update(retries(7)));
    assert_eq!((first.version, second.version), (1, 2));

    let versions = persistence.versions.lock().unwrap().clone();
    assert_eq!(versions.last(), Some(&2), "{versions:?}");
    assert!(versions.windows(2).all(|w| w[0] < w[1]), "{versions:?}");
    assert_eq!(store.get().version, 2);
}

#[tokio::test]
async fn failed_save_is_retried_by_the_next_update() {
    struct FlakyPersistence {
        fail_next: std::sync::atomic::AtomicBool,
        versions: Mutex<Vec<u64>>,
    }

    #[async_trait::async_trait]
    impl ConfigPersistence for FlakyPersistence {
        async fn load(&self) -> Result<Option<IntegrationConfig>, ConfigError> {
            Ok(None)
        }

        async fn save(&self, config: &IntegrationConfig) -> Result<(), ConfigError> {
            if self.fail_next.swap(false, std::sync::atomic::Ordering::SeqCst) {
                return Err(ConfigError::Io("disk full".into()));
            }
            self.versions.lock().unwrap().push(config.version);
            Ok(())
        }
    }

    let persistence = Arc::new(FlakyPersistence { fail_next: true.into(), versions: Mutex::new(Vec::new()) });
    let store = ConfigStore::new(IntegrationConfig::default(), persistence.clone());
    store.update(ConfigPatch::default()).await;
    store.update(ConfigPatch::default()).await;
    assert_eq!(*persistence.versions.lock().unwrap(), vec![2]);
}

#[tokio::test]
async fn concurrent_file_saves_leave_a_readable_snapshot() {
    let path = std::env::temp_dir().join(format!("fertility-bridge-{}.json", uuid::Uuid::new_v4()));
    let persistence = JsonFilePersistence::new(&path);

    let configs: Vec<IntegrationConfig> =
        (1..=8).map(|version| IntegrationConfig { version, ..IntegrationConfig::default() }).collect();
    let results = futures::future::join_all(configs.iter().map(|c| persistence.save(c))).await;
    assert!(results.iter().all(Result::is_ok), "{results:?}");

    let loaded = persistence.load().await.unwrap().unwrap();
    assert!((1..=8).contains(&loaded.version));

    let _ = tokio::fs::remove_file(&path).await;
}

#[tokio::test]
async fn json_file_persistence_round_trips() {
    let path = std::env::temp_dir().join(format!("fertility-bridge-{}.json", uuid::Uuid::new_v4()));
    let persistence = JsonFilePersistence::new(&path);
    assert!(persistence.load().await.unwrap().is_none());

    let mut cfg = IntegrationConfig::default();
    cfg.version = 3;
    cfg.ai.provider = ProviderId::Gemini;
    cfg.emr.features.sync_outcomes = false;
    persistence.save(&cfg).await.unwrap();

    let loaded = persistence.load().await.unwrap().unwrap();
    assert_eq!(loaded, cfg);

    let _ = tokio::fs::remove_file(&path).await;
}

#[test]
fn patch_deserializes_from_camel_case_json() {
    let patch: ConfigPatch = serde_json::from_value(serde_json::json!({
        "ai": { "provider": "openrouter", "enableFallback": false, "maxTokens": 800 },
        "emr": { "baseUrl": "https://fhir.test/", "features": { "syncCycles": false } }
    }))
    .unwrap();
    let mut cfg = IntegrationConfig::default();
    cfg.apply(patch);
    assert_eq!(cfg.ai.provider, ProviderId::OpenRouter);
    assert!(!cfg.ai.enable_fallback);
    assert_eq!(cfg.ai.max_tokens, 800);
    assert_eq!(cfg.emr.base_url.as_deref(), Some("https://fhir.test"));
    assert!(!cfg.emr.features.sync_cycles);
    assert!(cfg.emr.features.sync_monitoring);
}
