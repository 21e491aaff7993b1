//! Outbound HTTP for provider calls.
//!
//! The trait exists so the gateway can be exercised without a network.
//! The real implementation is a thin reqwest wrapper; deadlines are applied
//! by the caller with `tokio::time::timeout`, which drops (and so aborts)
//! the in-flight request.

use std::time::Duration;

use super::request::ProviderRequest;
use super::types::GatewayError;
use crate::error::TransportError;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait::async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Send one request and return the raw status and body.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no HTTP response was received.
    async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse, TransportError>;
}

pub struct HttpProviderTransport {
    http: reqwest::Client,
}

impl HttpProviderTransport {
    /// # Errors
    ///
    /// Returns [`GatewayError::HttpClientBuild`] if the TLS backend can't initialize.
    pub fn new() -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait::async_trait]
impl ProviderTransport for HttpProviderTransport {
    async fn send(&self, request: &ProviderRequest) -> Result<ProviderResponse, TransportError> {
        // Content-Type travels in `request.headers`.
        let mut builder = self.http.post(&request.url).body(request.body.to_string());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Failed(e.without_url().to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Failed(e.without_url().to_string()))?;
        Ok(ProviderResponse { status, body })
    }
}
