//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. The
//! gateway and the EMR client share one `ConfigStore`, so a config update is
//! seen by the next call of either adapter while in-flight calls keep the
//! snapshot they started with.

use std::sync::Arc;

use crate::config::ConfigStore;
use crate::emr::EmrSyncClient;
use crate::emr::transport::FhirTransport;
use crate::llm::AiGateway;
use crate::llm::transport::ProviderTransport;

/// Clone is required by Axum; every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigStore,
    pub gateway: AiGateway,
    pub emr: EmrSyncClient,
}

impl AppState {
    #[must_use]
    pub fn new(config: ConfigStore, ai: Arc<dyn ProviderTransport>, fhir: Arc<dyn FhirTransport>) -> Self {
        Self {
            gateway: AiGateway::new(config.clone(), ai),
            emr: EmrSyncClient::new(config.clone(), fhir),
            config,
        }
    }
}
