use super::*;
use std::collections::HashSet;

#[test]
fn every_id_resolves_to_its_own_profile() {
    for id in ProviderId::ALL {
        assert_eq!(profile(id).id, id, "profile for {id} carries the wrong id");
    }
}

#[test]
fn registry_has_no_duplicate_ids() {
    let ids: HashSet<ProviderId> = registry().iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), ProviderId::ALL.len());
}

#[test]
fn provider_id_parses_case_insensitively() {
    assert_eq!("Groq".parse::<ProviderId>().unwrap(), ProviderId::Groq);
    assert_eq!(" openrouter ".parse::<ProviderId>().unwrap(), ProviderId::OpenRouter);
    assert_eq!("huggingface".parse::<ProviderId>().unwrap(), ProviderId::HuggingFace);
}

#[test]
fn provider_id_rejects_unknown_names() {
    let err = "watson".parse::<ProviderId>().unwrap_err();
    assert!(err.contains("unknown AI provider"));
}

#[test]
fn provider_id_serde_matches_as_str() {
    for id in ProviderId::ALL {
        let json = serde_json::to_value(id).unwrap();
        assert_eq!(json, serde_json::json!(id.as_str()));
    }
}

#[test]
fn only_mock_and_custom_lack_a_fixed_endpoint() {
    for p in registry() {
        let expect_empty = matches!(p.id, ProviderId::Mock | ProviderId::Custom);
        assert_eq!(p.endpoint_template.is_empty(), expect_empty, "{}", p.id);
    }
}

#[test]
fn mock_is_the_only_keyless_provider() {
    for p in registry() {
        assert_eq!(p.requires_api_key(), p.id != ProviderId::Mock, "{}", p.id);
    }
}

#[test]
fn gemini_uses_query_key_and_generate_contents() {
    let p = profile(ProviderId::Gemini);
    assert_eq!(p.auth, AuthStyle::QueryKey);
    assert_eq!(p.request_shape, RequestShape::GenerateContents);
    assert!(p.endpoint_template.contains("{model}"));
}

#[test]
fn anthropic_pins_api_version() {
    let p = profile(ProviderId::Anthropic);
    assert_eq!(p.auth, AuthStyle::HeaderKey { header: "x-api-key" });
    assert!(p.extra_headers.iter().any(|(name, _)| *name == "anthropic-version"));
}
