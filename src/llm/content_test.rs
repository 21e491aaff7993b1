use super::*;
use crate::llm::fallback;
use serde_json::json;

fn fallbacks() -> (PersonaResult, InterventionPlanResult) {
    let ctx = json!({ "personalInfo": { "firstName": "Sarah" } });
    (fallback::persona(&ctx), fallback::intervention_plan(&ctx))
}

// =============================================================================
// extract_json
// =============================================================================

#[test]
fn plain_object_parses() {
    assert_eq!(extract_json(r#"{"a": 1}"#), Some(json!({ "a": 1 })));
}

#[test]
fn fenced_object_parses() {
    let text = "```json\n{\"persona\": {}}\n```";
    assert_eq!(extract_json(text), Some(json!({ "persona": {} })));
}

#[test]
fn one_line_fence_parses() {
    let tagged = "```json {\"persona\": {\"patientName\": \"Sarah\"}}```";
    assert_eq!(extract_json(tagged), Some(json!({ "persona": { "patientName": "Sarah" } })));
    assert_eq!(extract_json("```{\"a\": 1}```"), Some(json!({ "a": 1 })));
}

#[test]
fn object_embedded_in_chatter_parses() {
    let text = "Sure! Here is the analysis:\n{\"a\": {\"b\": 2}}\nLet me know if you need more.";
    assert_eq!(extract_json(text), Some(json!({ "a": { "b": 2 } })));
}

#[test]
fn non_json_text_is_rejected() {
    assert_eq!(extract_json("I cannot help with that."), None);
    assert_eq!(extract_json("} backwards {"), None);
    assert_eq!(extract_json(""), None);
}

#[test]
fn top_level_array_is_rejected() {
    assert_eq!(extract_json("[1, 2, 3]"), None);
}

// =============================================================================
// locate_sections
// =============================================================================

#[test]
fn wrapped_sections_are_located() {
    let value = json!({ "persona": { "summary": "x" }, "interventionPlan": { "title": "t" } });
    let sections = locate_sections(&value).unwrap();
    assert_eq!(sections.persona, json!({ "summary": "x" }));
    assert_eq!(sections.plan, Some(json!({ "title": "t" })));
}

#[test]
fn bare_persona_is_located() {
    let value = json!({ "psychologicalProfile": { "stressLevel": "High" } });
    let sections = locate_sections(&value).unwrap();
    assert_eq!(sections.persona, value);
    assert!(sections.plan.is_none());
}

#[test]
fn missing_persona_is_not_located() {
    assert!(locate_sections(&json!({ "interventionPlan": {} })).is_none());
    assert!(locate_sections(&json!({ "persona": "not an object" })).is_none());
}

// =============================================================================
// merge_sections
// =============================================================================

#[test]
fn provider_values_win_and_gaps_are_recorded() {
    let (persona, plan) = fallbacks();
    let sections = Sections {
        persona: json!({
            "patientName": "Sarah Jones",
            "psychologicalProfile": { "stressLevel": "High", "anxietyLevel": "" },
            "personalityTraits": ["Resilient", "", 3],
            "summary": "Provider summary"
        }),
        plan: None,
    };

    let merged = merge_sections(&sections, &persona, &plan).unwrap();
    assert_eq!(merged.persona.patient_name, "Sarah Jones");
    assert_eq!(merged.persona.psychological_profile.stress_level, "High");
    assert_eq!(merged.persona.psychological_profile.anxiety_level, persona.psychological_profile.anxiety_level);
    assert_eq!(merged.persona.personality_traits, vec!["Resilient".to_string()]);
    assert_eq!(merged.persona.summary, "Provider summary");
    assert_eq!(merged.persona.motivational_factors, persona.motivational_factors);
    assert_eq!(merged.intervention_plan, plan);

    for path in [
        "persona.psychologicalProfile.anxietyLevel",
        "persona.psychologicalProfile.copingStyle",
        "persona.motivationalFactors",
        "interventionPlan",
    ] {
        assert!(merged.filled_fields.iter().any(|f| f == path), "missing {path}");
    }
    assert!(!merged.filled_fields.iter().any(|f| f == "persona.patientName"));
}

#[test]
fn phases_merge_element_wise() {
    let (persona, plan) = fallbacks();
    let sections = Sections {
        persona: json!({}),
        plan: Some(json!({
            "title": "Custom plan",
            "phases": [
                { "name": "Intake", "durationWeeks": 3 },
                { "name": "Extra", "durationWeeks": 2.0, "activities": ["Journaling"] },
                "not a phase"
            ]
        })),
    };

    let merged = merge_sections(&sections, &persona, &plan).unwrap();
    let phases = &merged.intervention_plan.phases;
    assert_eq!(merged.intervention_plan.title, "Custom plan");
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[0].name, "Intake");
    assert_eq!(phases[0].duration_weeks, 3);
    assert_eq!(phases[0].activities, plan.phases[0].activities);
    assert_eq!(phases[1].duration_weeks, 2);
    assert_eq!(phases[1].activities, vec!["Journaling".to_string()]);
    assert_eq!(phases[1].focus, plan.phases[1].focus);
}

#[test]
fn wrong_number_types_keep_fallback() {
    let (persona, plan) = fallbacks();
    let sections = Sections {
        persona: json!({}),
        plan: Some(json!({ "phases": [{ "durationWeeks": -1 }, { "durationWeeks": "four" }] })),
    };

    let merged = merge_sections(&sections, &persona, &plan).unwrap();
    assert_eq!(merged.intervention_plan.phases[0].duration_weeks, plan.phases[0].duration_weeks);
    assert_eq!(merged.intervention_plan.phases[1].duration_weeks, plan.phases[1].duration_weeks);
}

#[test]
fn empty_provider_arrays_keep_fallback() {
    let (persona, plan) = fallbacks();
    let sections = Sections {
        persona: json!({ "primaryConcerns": [] }),
        plan: Some(json!({ "strategies": [] })),
    };

    let merged = merge_sections(&sections, &persona, &plan).unwrap();
    assert_eq!(merged.persona.primary_concerns, persona.primary_concerns);
    assert_eq!(merged.intervention_plan.strategies, plan.strategies);
    assert!(merged.filled_fields.iter().any(|f| f == "persona.primaryConcerns"));
    assert!(merged.filled_fields.iter().any(|f| f == "interventionPlan.strategies"));
}
