use super::*;
use crate::llm::provider::{ProviderId, profile};
use serde_json::json;

#[test]
fn chat_completion_envelope() {
    let raw = json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": " {\"a\":1} " } }]
    })
    .to_string();
    assert_eq!(extract_text(profile(ProviderId::Groq), &raw), "{\"a\":1}");
}

#[test]
fn gemini_envelope() {
    let raw = json!({ "candidates": [{ "content": { "parts": [{ "text": "hello" }] } }] }).to_string();
    assert_eq!(extract_text(profile(ProviderId::Gemini), &raw), "hello");
}

#[test]
fn anthropic_envelope() {
    let raw = json!({ "content": [{ "type": "text", "text": "hi there" }], "stop_reason": "end_turn" }).to_string();
    assert_eq!(extract_text(profile(ProviderId::Anthropic), &raw), "hi there");
}

#[test]
fn cohere_envelope() {
    let raw = json!({ "generations": [{ "id": "g1", "text": "generated" }] }).to_string();
    assert_eq!(extract_text(profile(ProviderId::Cohere), &raw), "generated");
}

#[test]
fn huggingface_array_and_object_envelopes() {
    let hf = profile(ProviderId::HuggingFace);
    assert_eq!(extract_text(hf, &json!([{ "generated_text": "array form" }]).to_string()), "array form");
    assert_eq!(extract_text(hf, &json!({ "generated_text": "object form" }).to_string()), "object form");
}

#[test]
fn missing_path_yields_empty_string() {
    let raw = json!({ "choices": [] }).to_string();
    assert_eq!(extract_text(profile(ProviderId::OpenAi), &raw), "");
}

#[test]
fn wrong_envelope_for_provider_yields_empty_string() {
    let raw = json!({ "generations": [{ "text": "cohere text" }] }).to_string();
    assert_eq!(extract_text(profile(ProviderId::OpenAi), &raw), "");
}

#[test]
fn non_json_body_yields_empty_string() {
    assert_eq!(extract_text(profile(ProviderId::Groq), "<html>Bad Gateway</html>"), "");
}

#[test]
fn non_string_content_yields_empty_string() {
    let raw = json!({ "choices": [{ "message": { "content": null } }] }).to_string();
    assert_eq!(extract_text(profile(ProviderId::Mistral), &raw), "");
}
