use super::*;
use crate::error::ErrorCode;
use serde_json::json;

fn request(template: &str) -> AnalysisRequest {
    AnalysisRequest {
        subject_context: json!({ "personalInfo": { "firstName": "Sarah" } }),
        prompt_template: template.to_string(),
        temperature: 0.7,
        max_output_tokens: 500,
        timeout_ms: 5000,
    }
}

#[test]
fn render_prompt_substitutes_placeholder() {
    let prompt = request("Analyze: {{context}} now").render_prompt();
    assert!(prompt.starts_with("Analyze: {"));
    assert!(prompt.contains("\"firstName\": \"Sarah\""));
    assert!(!prompt.contains(CONTEXT_PLACEHOLDER));
    assert!(prompt.contains("\"persona\""));
}

#[test]
fn render_prompt_appends_context_without_placeholder() {
    let prompt = request("Analyze this patient.").render_prompt();
    assert!(prompt.starts_with("Analyze this patient.\n\nPatient context:\n"));
    assert!(prompt.contains("Sarah"));
}

#[test]
fn render_prompt_uses_default_template_when_blank() {
    let prompt = request("   ").render_prompt();
    assert!(prompt.contains("fertility counseling specialist"));
}

#[test]
fn new_request_takes_tunables_from_settings() {
    let settings = AiSettings { temperature: 0.2, max_tokens: 321, timeout_ms: 999, ..AiSettings::default() };
    let req = AnalysisRequest::new(json!({}), &settings);
    assert!((req.temperature - 0.2).abs() < f32::EPSILON);
    assert_eq!(req.max_output_tokens, 321);
    assert_eq!(req.timeout_ms, 999);
    assert_eq!(req.prompt_template, DEFAULT_PROMPT_TEMPLATE);
}

#[test]
fn analysis_request_deserializes_camel_case() {
    let req: AnalysisRequest = serde_json::from_value(json!({
        "subjectContext": { "personalInfo": { "firstName": "Sarah" } },
        "promptTemplate": "...",
        "temperature": 0.7,
        "maxOutputTokens": 500,
        "timeoutMs": 5000
    }))
    .unwrap();
    assert_eq!(req.max_output_tokens, 500);
    assert_eq!(req.timeout_ms, 5000);
}

#[test]
fn provider_error_retryable_follows_status() {
    let throttled = GatewayError::ProviderError { provider: ProviderId::Groq, status: 429, body: String::new() };
    let bad_request = GatewayError::ProviderError { provider: ProviderId::Groq, status: 400, body: String::new() };
    assert!(throttled.retryable());
    assert!(!bad_request.retryable());
    assert_eq!(throttled.error_code(), "E_PROVIDER_ERROR");
}

#[test]
fn configuration_error_is_not_retryable() {
    let err = GatewayError::Configuration("missing API key".into());
    assert!(!err.retryable());
    assert_eq!(err.error_code(), "E_AI_CONFIGURATION");
}

#[test]
fn source_serializes_with_kind_tag() {
    let source = AnalysisSource::Fallback { reason: FallbackReason::HttpStatus { status: 429 } };
    let json = serde_json::to_value(&source).unwrap();
    assert_eq!(json["kind"], "fallback");
    assert_eq!(json["reason"]["type"], "httpStatus");
    assert_eq!(json["reason"]["status"], 429);
}
