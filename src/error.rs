//! Shared error plumbing.
//!
//! Each component owns its own `thiserror` enum. They all implement
//! [`ErrorCode`] so the HTTP layer can render a grepable code and a
//! retryable hint without knowing the concrete type.

/// Grepable error code and retryable flag for structured error responses.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// HTTP statuses that are worth another attempt.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500..=599)
}

/// Failure below the HTTP status line: nothing usable came back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The caller's deadline elapsed; the in-flight request was dropped.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Connection, TLS or body read failure.
    #[error("request failed: {0}")]
    Failed(String),
}
