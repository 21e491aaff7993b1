//! Outbound FHIR HTTP.
//!
//! Requests are fully built (URL, headers, body) before they reach the
//! transport, so tests can script responses per URL without a network.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use super::EmrError;
use crate::config::{EmrProviderKind, EmrSettings, REDACTED};
use crate::error::TransportError;

pub const FHIR_JSON: &str = "application/fhir+json";
const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FhirMethod {
    Get,
    Post,
}

impl fmt::Display for FhirMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

#[derive(Clone, PartialEq)]
pub struct FhirRequest {
    pub method: FhirMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl FhirRequest {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for FhirRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: Vec<(&str, &str)> = self
            .headers
            .iter()
            .map(|(k, v)| {
                if k.eq_ignore_ascii_case("authorization") {
                    (k.as_str(), REDACTED)
                } else {
                    (k.as_str(), v.as_str())
                }
            })
            .collect();
        f.debug_struct("FhirRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &headers)
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FhirResponse {
    pub status: u16,
    pub body: String,
    /// `Location` header of a create, e.g. `Encounter/123/_history/1`.
    pub location: Option<String>,
}

impl FhirResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait::async_trait]
pub trait FhirTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no HTTP response was received.
    async fn send(&self, request: &FhirRequest) -> Result<FhirResponse, TransportError>;
}

/// Headers every EMR request carries for the configured vendor.
#[must_use]
pub fn auth_headers(settings: &EmrSettings) -> Vec<(String, String)> {
    let mut headers = vec![
        ("Accept".to_string(), FHIR_JSON.to_string()),
        ("Content-Type".to_string(), FHIR_JSON.to_string()),
    ];
    if let Some(key) = settings.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        headers.push(("Authorization".to_string(), format!("Bearer {}", key.trim())));
    }
    if settings.provider == EmrProviderKind::Epic {
        if let Some(client_id) = settings.client_id.as_deref().filter(|c| !c.trim().is_empty()) {
            headers.push(("Epic-Client-ID".to_string(), client_id.trim().to_string()));
        }
    }
    headers
}

pub struct HttpFhirTransport {
    http: reqwest::Client,
}

impl HttpFhirTransport {
    /// # Errors
    ///
    /// Returns [`EmrError::HttpClientBuild`] if the TLS backend can't initialize.
    pub fn new() -> Result<Self, EmrError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| EmrError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl FhirTransport for HttpFhirTransport {
    async fn send(&self, request: &FhirRequest) -> Result<FhirResponse, TransportError> {
        let mut builder = match request.method {
            FhirMethod::Get => self.http.get(&request.url),
            FhirMethod::Post => self.http.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Failed(e.without_url().to_string()))?;
        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Failed(e.without_url().to_string()))?;
        Ok(FhirResponse { status, body, location })
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
