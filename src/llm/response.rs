//! Provider response parsing.
//!
//! Never fails: a body that isn't JSON, or JSON without text at the
//! profile's extraction path, yields an empty string. The gateway treats
//! empty as "unusable" and falls back, which keeps "the call succeeded"
//! separate from "the content is usable".

use serde_json::Value;

use super::provider::{ExtractionPath, ProviderProfile};

/// Extract the generated text from a raw response body.
#[must_use]
pub fn extract_text(profile: &ProviderProfile, raw: &str) -> String {
    match serde_json::from_str::<Value>(raw) {
        Ok(json) => extract_from_value(profile.extraction, &json),
        Err(_) => String::new(),
    }
}

/// Extract the generated text from an already-parsed body.
#[must_use]
pub fn extract_from_value(path: ExtractionPath, json: &Value) -> String {
    let found = json.pointer(path.pointer()).and_then(Value::as_str).or_else(|| {
        // Some inference deployments return a bare object instead of a one-element array.
        if path == ExtractionPath::GeneratedText {
            json.pointer("/generated_text").and_then(Value::as_str)
        } else {
            None
        }
    });
    found.map(|s| s.trim().to_string()).unwrap_or_default()
}

#[cfg(test)]
#[path = "response_test.rs"]
mod tests;
