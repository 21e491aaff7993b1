use super::*;
use crate::llm::provider::{ProviderId, profile};
use serde_json::json;

fn settings(provider: ProviderId, key: Option<&str>) -> AiSettings {
    AiSettings {
        enabled: true,
        provider,
        api_key: key.map(str::to_string),
        ..AiSettings::default()
    }
}

fn request() -> AnalysisRequest {
    AnalysisRequest {
        subject_context: json!({ "personalInfo": { "firstName": "Sarah" } }),
        prompt_template: "Analyze {{context}}".into(),
        temperature: 0.5,
        max_output_tokens: 500,
        timeout_ms: 5000,
    }
}

fn approx(value: &Value, expected: f64) -> bool {
    value.as_f64().is_some_and(|v| (v - expected).abs() < 1e-6)
}

// ===== credentials =====

#[test]
fn missing_key_is_configuration_error_for_every_keyed_provider() {
    for id in ProviderId::ALL {
        if id == ProviderId::Mock {
            continue;
        }
        let mut s = settings(id, None);
        s.endpoint = Some("https://proxy.test/v1/chat".into());
        let err = build_request(profile(id), &s, &request()).unwrap_err();
        assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("missing API key")), "{id}");
    }
}

#[test]
fn blank_key_counts_as_missing() {
    let err = build_request(profile(ProviderId::Groq), &settings(ProviderId::Groq, Some("  ")), &request()).unwrap_err();
    assert!(matches!(err, GatewayError::Configuration(_)));
}

#[test]
fn custom_without_endpoint_is_configuration_error() {
    let err =
        build_request(profile(ProviderId::Custom), &settings(ProviderId::Custom, Some("k")), &request()).unwrap_err();
    assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("custom provider requires an endpoint")));
}

#[test]
fn unparseable_endpoint_is_configuration_error() {
    let mut s = settings(ProviderId::Custom, Some("k"));
    s.endpoint = Some("not a url".into());
    let err = build_request(profile(ProviderId::Custom), &s, &request()).unwrap_err();
    assert!(matches!(err, GatewayError::Configuration(ref m) if m.contains("invalid endpoint")));
}

// ===== endpoint + headers =====

#[test]
fn bearer_provider_sets_authorization_header() {
    let req = build_request(profile(ProviderId::Groq), &settings(ProviderId::Groq, Some("gsk-1")), &request()).unwrap();
    assert_eq!(req.url, "https://api.groq.com/openai/v1/chat/completions");
    assert_eq!(req.header("authorization"), Some("Bearer gsk-1"));
    assert_eq!(req.header("content-type"), Some("application/json"));
}

#[test]
fn header_key_provider_uses_vendor_header() {
    let req = build_request(profile(ProviderId::Anthropic), &settings(ProviderId::Anthropic, Some("sk-ant")), &request())
        .unwrap();
    assert_eq!(req.header("x-api-key"), Some("sk-ant"));
    assert_eq!(req.header("anthropic-version"), Some("2023-06-01"));
    assert!(req.header("authorization").is_none());
}

#[test]
fn query_key_provider_embeds_key_and_model_in_url() {
    let req =
        build_request(profile(ProviderId::Gemini), &settings(ProviderId::Gemini, Some("AIza-1")), &request()).unwrap();
    assert_eq!(
        req.url,
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent?key=AIza-1"
    );
    assert!(req.header("authorization").is_none());
}

#[test]
fn configured_model_overrides_default() {
    let mut s = settings(ProviderId::HuggingFace, Some("hf"));
    s.model = Some("tiiuae/falcon-7b-instruct".into());
    let req = build_request(profile(ProviderId::HuggingFace), &s, &request()).unwrap();
    assert_eq!(req.url, "https://api-inference.huggingface.co/models/tiiuae/falcon-7b-instruct");
    assert_eq!(req.body["model"], "tiiuae/falcon-7b-instruct");
}

#[test]
fn endpoint_override_applies_to_fixed_providers() {
    let mut s = settings(ProviderId::OpenAi, Some("sk"));
    s.endpoint = Some("https://gateway.internal/openai/chat".into());
    let req = build_request(profile(ProviderId::OpenAi), &s, &request()).unwrap();
    assert_eq!(req.url, "https://gateway.internal/openai/chat");
}

#[test]
fn mock_builds_without_key_but_has_no_endpoint() {
    let err = build_request(profile(ProviderId::Mock), &settings(ProviderId::Mock, None), &request()).unwrap_err();
    assert!(matches!(err, GatewayError::Configuration(ref m) if !m.contains("API key")));
}

// ===== body shapes =====

#[test]
fn chat_messages_body_shape() {
    let req = build_request(profile(ProviderId::OpenAi), &settings(ProviderId::OpenAi, Some("sk")), &request()).unwrap();
    assert_eq!(req.body["model"], "gpt-4o-mini");
    assert_eq!(req.body["messages"][0]["role"], "user");
    assert!(req.body["messages"][0]["content"].as_str().unwrap().starts_with("Analyze {"));
    assert_eq!(req.body["max_tokens"], 500);
    assert!(approx(&req.body["temperature"], 0.5));
}

#[test]
fn completion_prompt_body_shape() {
    let req = build_request(profile(ProviderId::Cohere), &settings(ProviderId::Cohere, Some("co")), &request()).unwrap();
    assert_eq!(req.body["model"], "command");
    assert!(req.body["prompt"].as_str().unwrap().contains("Sarah"));
    assert_eq!(req.body["max_tokens"], 500);
    assert!(req.body.get("messages").is_none());
}

#[test]
fn generate_contents_body_shape() {
    let req = build_request(profile(ProviderId::Gemini), &settings(ProviderId::Gemini, Some("g")), &request()).unwrap();
    assert!(req.body["contents"][0]["parts"][0]["text"].as_str().unwrap().contains("Sarah"));
    assert_eq!(req.body["generationConfig"]["maxOutputTokens"], 500);
    assert!(approx(&req.body["generationConfig"]["temperature"], 0.5));
    assert!(req.body.get("model").is_none());
}

#[test]
fn debug_redacts_credentials() {
    let req = build_request(profile(ProviderId::Gemini), &settings(ProviderId::Gemini, Some("AIza-secret")), &request())
        .unwrap();
    let rendered = format!("{req:?}");
    assert!(!rendered.contains("AIza-secret"));

    let req =
        build_request(profile(ProviderId::Groq), &settings(ProviderId::Groq, Some("gsk-secret")), &request()).unwrap();
    assert!(!format!("{req:?}").contains("gsk-secret"));
}
