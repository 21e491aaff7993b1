//! Provider request building.
//!
//! Pure: turns a profile, a settings snapshot and an [`AnalysisRequest`]
//! into a fully formed HTTP request. Every configuration problem is caught
//! here, before anything touches the network.

use std::fmt;

use serde_json::{Value, json};

use super::provider::{AuthStyle, ProviderId, ProviderProfile, RequestShape};
use super::types::{AnalysisRequest, GatewayError};
use crate::config::{AiSettings, REDACTED};

/// A ready-to-send provider call. Always `POST` with a JSON body.
#[derive(Clone, PartialEq)]
pub struct ProviderRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl ProviderRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for ProviderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let sensitive = k.eq_ignore_ascii_case("authorization") || k.eq_ignore_ascii_case("x-api-key");
                (k.as_str(), if sensitive { REDACTED } else { v.as_str() })
            })
            .collect();
        let url = match self.url.split_once("key=") {
            Some((head, _)) => format!("{head}key={REDACTED}"),
            None => self.url.clone(),
        };
        f.debug_struct("ProviderRequest")
            .field("url", &url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

/// Build the provider-specific HTTP request.
///
/// # Errors
///
/// Returns [`GatewayError::Configuration`] when the provider needs an API
/// key that isn't set, when `custom` has no endpoint, or when the
/// resulting URL doesn't parse.
pub fn build_request(
    profile: &ProviderProfile,
    settings: &AiSettings,
    request: &AnalysisRequest,
) -> Result<ProviderRequest, GatewayError> {
    let api_key = settings
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty());
    if profile.requires_api_key() && api_key.is_none() {
        return Err(GatewayError::Configuration(format!("missing API key for provider {}", profile.id)));
    }

    let model = settings
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(profile.default_model);

    let url = endpoint_url(profile, settings, model, api_key)?;
    let headers = headers(profile, api_key);
    let body = body(profile.request_shape, model, &request.render_prompt(), request);

    Ok(ProviderRequest { url, headers, body })
}

fn endpoint_url(
    profile: &ProviderProfile,
    settings: &AiSettings,
    model: &str,
    api_key: Option<&str>,
) -> Result<String, GatewayError> {
    let template = settings
        .endpoint
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .unwrap_or(profile.endpoint_template);
    if template.is_empty() {
        let hint = if profile.id == ProviderId::Custom { "custom provider requires an endpoint" } else { "no endpoint" };
        return Err(GatewayError::Configuration(format!("{hint} ({})", profile.id)));
    }

    let mut url = reqwest::Url::parse(&template.replace("{model}", model))
        .map_err(|e| GatewayError::Configuration(format!("invalid endpoint for {}: {e}", profile.id)))?;
    if profile.auth == AuthStyle::QueryKey {
        if let Some(key) = api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
    }
    Ok(url.into())
}

fn headers(profile: &ProviderProfile, api_key: Option<&str>) -> Vec<(String, String)> {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    match (profile.auth, api_key) {
        (AuthStyle::Bearer, Some(key)) => headers.push(("Authorization".to_string(), format!("Bearer {key}"))),
        (AuthStyle::HeaderKey { header }, Some(key)) => headers.push((header.to_string(), key.to_string())),
        _ => {}
    }
    headers.extend(
        profile
            .extra_headers
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string())),
    );
    headers
}

fn body(shape: RequestShape, model: &str, prompt: &str, request: &AnalysisRequest) -> Value {
    match shape {
        RequestShape::ChatMessages => json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
        }),
        RequestShape::CompletionPrompt => json!({
            "model": model,
            "prompt": prompt,
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
        }),
        RequestShape::GenerateContents => json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_output_tokens,
            },
        }),
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
