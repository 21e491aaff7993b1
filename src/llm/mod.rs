//! AI gateway: one analysis call across many LLM vendors.
//!
//! DESIGN
//! ======
//! Vendors differ only in data: each is a [`provider::ProviderProfile`] in a
//! static registry, and request building / text extraction dispatch on the
//! profile's shape enums. The gateway threads every step through an explicit
//! [`Outcome`] so the fallback-versus-propagate policy is visible:
//!
//! ```text
//! Dispatching ──▶ ParsingContent ──▶ Merging ──▶ Done
//!      │                │
//!      └──── NeedsFallback ──────▶ deterministic generator
//! ```
//!
//! Only configuration errors and (with fallback disabled) transport or
//! status failures reach the caller. Each call reads one config snapshot at
//! entry; a concurrent `ConfigStore::update` never changes an in-flight call.

pub mod content;
pub mod fallback;
pub mod provider;
pub mod request;
pub mod response;
pub mod transport;
pub mod types;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{AiSettings, ConfigStore, DEFAULT_AI_TIMEOUT_MS};
use crate::error::TransportError;
use provider::ProviderId;
use transport::{ProviderResponse, ProviderTransport};
use types::{AnalysisOutcome, AnalysisRequest, AnalysisSource, FallbackReason, GatewayError};

// =============================================================================
// OUTCOME
// =============================================================================

/// Result of one gateway stage.
enum Outcome<T> {
    Ready(T),
    NeedsFallback(FallbackReason),
    Hard(GatewayError),
}

impl<T> Outcome<T> {
    fn and_then<U>(self, next: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Self::Ready(value) => next(value),
            Self::NeedsFallback(reason) => Outcome::NeedsFallback(reason),
            Self::Hard(err) => Outcome::Hard(err),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Dispatching,
    ParsingContent,
    Merging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dispatching => "dispatching",
            Self::ParsingContent => "parsing_content",
            Self::Merging => "merging",
        })
    }
}

// =============================================================================
// GATEWAY
// =============================================================================

#[derive(Clone)]
pub struct AiGateway {
    store: ConfigStore,
    transport: Arc<dyn ProviderTransport>,
}

impl AiGateway {
    #[must_use]
    pub fn new(store: ConfigStore, transport: Arc<dyn ProviderTransport>) -> Self {
        Self { store, transport }
    }

    /// Produce a persona and intervention plan for `request`.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Configuration`] when the selected provider lacks a key or endpoint.
    /// - [`GatewayError::ProviderUnavailable`] / [`GatewayError::ProviderError`] only
    ///   when `enable_fallback` is off.
    ///
    /// With fallback on, every other failure yields a fallback result.
    pub async fn generate(&self, request: &AnalysisRequest) -> Result<AnalysisOutcome, GatewayError> {
        let config = self.store.get();
        let settings = &config.ai;
        let provider = settings.provider;

        if !settings.enabled {
            return Ok(fallback_outcome(request, FallbackReason::Disabled));
        }
        if provider == ProviderId::Mock {
            return Ok(fallback_outcome(request, FallbackReason::MockProvider));
        }

        let profile = provider::profile(provider);
        let http_request = request::build_request(profile, settings, request)?;
        let started = Instant::now();

        let outcome = self
            .dispatch(settings, request, &http_request)
            .await
            .and_then(|response| parse_content(profile, &response.body))
            .and_then(|sections| merge(request, &sections, provider));

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Outcome::Ready(result) => {
                info!(%provider, elapsed_ms, filled = filled_count(&result), "ai: provider result");
                Ok(result)
            }
            Outcome::NeedsFallback(reason) => {
                info!(%provider, elapsed_ms, %reason, "ai: using fallback");
                Ok(fallback_outcome(request, reason))
            }
            Outcome::Hard(err) => {
                warn!(%provider, elapsed_ms, error = %err, "ai: provider failed");
                Err(err)
            }
        }
    }

    async fn dispatch(
        &self,
        settings: &AiSettings,
        request: &AnalysisRequest,
        http_request: &request::ProviderRequest,
    ) -> Outcome<ProviderResponse> {
        let timeout_ms = [request.timeout_ms, settings.timeout_ms]
            .into_iter()
            .find(|&ms| ms > 0)
            .unwrap_or(DEFAULT_AI_TIMEOUT_MS);
        debug!(provider = %settings.provider, timeout_ms, stage = %Stage::Dispatching, "ai: sending");

        let sent = tokio::time::timeout(Duration::from_millis(timeout_ms), self.transport.send(http_request)).await;
        let result = sent.unwrap_or(Err(TransportError::Timeout(timeout_ms)));

        match result {
            Ok(response) if (200..300).contains(&response.status) => Outcome::Ready(response),
            Ok(response) => {
                warn!(provider = %settings.provider, status = response.status, stage = %Stage::Dispatching, "ai: non-success status");
                if settings.enable_fallback {
                    Outcome::NeedsFallback(FallbackReason::HttpStatus { status: response.status })
                } else {
                    Outcome::Hard(GatewayError::ProviderError {
                        provider: settings.provider,
                        status: response.status,
                        body: response.body,
                    })
                }
            }
            Err(err) => {
                warn!(provider = %settings.provider, error = %err, stage = %Stage::Dispatching, "ai: transport failed");
                if settings.enable_fallback {
                    Outcome::NeedsFallback(match err {
                        TransportError::Timeout(after_ms) => FallbackReason::Timeout { after_ms },
                        TransportError::Failed(message) => FallbackReason::Transport { message },
                    })
                } else {
                    Outcome::Hard(GatewayError::ProviderUnavailable {
                        provider: settings.provider,
                        message: err.to_string(),
                    })
                }
            }
        }
    }
}

fn parse_content(profile: &provider::ProviderProfile, body: &str) -> Outcome<content::Sections> {
    let text = response::extract_text(profile, body);
    if text.is_empty() {
        debug!(provider = %profile.id, stage = %Stage::ParsingContent, "ai: empty content");
        return Outcome::NeedsFallback(FallbackReason::EmptyContent);
    }
    let Some(json) = content::extract_json(&text) else {
        debug!(provider = %profile.id, stage = %Stage::ParsingContent, "ai: content is not json");
        return Outcome::NeedsFallback(FallbackReason::InvalidJson);
    };
    match content::locate_sections(&json) {
        Some(sections) => Outcome::Ready(sections),
        None => Outcome::NeedsFallback(FallbackReason::MissingSections),
    }
}

fn merge(request: &AnalysisRequest, sections: &content::Sections, provider: ProviderId) -> Outcome<AnalysisOutcome> {
    let ctx = &request.subject_context;
    match content::merge_sections(sections, &fallback::persona(ctx), &fallback::intervention_plan(ctx)) {
        Ok(merged) => Outcome::Ready(AnalysisOutcome {
            persona: merged.persona,
            intervention_plan: merged.intervention_plan,
            source: AnalysisSource::Provider { provider, filled_fields: merged.filled_fields },
        }),
        Err(reason) => {
            debug!(%provider, %reason, stage = %Stage::Merging, "ai: merge failed");
            Outcome::NeedsFallback(reason)
        }
    }
}

fn fallback_outcome(request: &AnalysisRequest, reason: FallbackReason) -> AnalysisOutcome {
    let ctx: &Value = &request.subject_context;
    AnalysisOutcome {
        persona: fallback::persona(ctx),
        intervention_plan: fallback::intervention_plan(ctx),
        source: AnalysisSource::Fallback { reason },
    }
}

fn filled_count(outcome: &AnalysisOutcome) -> usize {
    match &outcome.source {
        AnalysisSource::Provider { filled_fields, .. } => filled_fields.len(),
        AnalysisSource::Fallback { .. } => 0,
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
