//! Structured-output handling: find JSON in model text and complete it.
//!
//! Models wrap JSON in code fences, prepend chatter, or leave fields out.
//! `extract_json` recovers the object; `merge_sections` overlays whatever
//! the provider produced onto the deterministic result so every declared
//! field ends up populated, and reports which dotted paths were filled in.

use serde_json::{Map, Value};

use super::types::{FallbackReason, InterventionPlanResult, PersonaResult};

/// Persona and plan sections located in provider JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct Sections {
    pub persona: Value,
    pub plan: Option<Value>,
}

/// Parse the first JSON object out of free text.
#[must_use]
pub fn extract_json(text: &str) -> Option<Value> {
    let text = text.trim();
    let stripped = strip_code_fence(text);
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(stripped) {
        return Some(value);
    }
    outermost_object(stripped).or_else(|| outermost_object(text))
}

/// Slice from the first `{` to the last `}`, if that parses as an object.
fn outermost_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&text[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the language tag: its own line (```json\n), or a leading token on a one-line fence.
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Locate persona and plan. Accepts `{persona, interventionPlan}` or a bare persona object.
#[must_use]
pub fn locate_sections(value: &Value) -> Option<Sections> {
    let obj = value.as_object()?;
    let plan = obj
        .get("interventionPlan")
        .or_else(|| obj.get("plan"))
        .filter(|v| v.is_object())
        .cloned();
    if let Some(persona) = obj.get("persona").filter(|v| v.is_object()) {
        return Some(Sections { persona: persona.clone(), plan });
    }
    if obj.contains_key("psychologicalProfile") {
        return Some(Sections { persona: value.clone(), plan });
    }
    None
}

/// Provider sections completed from the fallback results.
#[derive(Debug, Clone, PartialEq)]
pub struct Merged {
    pub persona: PersonaResult,
    pub intervention_plan: InterventionPlanResult,
    /// Dotted paths taken from the fallback, prefixed `persona.` or `interventionPlan.`.
    pub filled_fields: Vec<String>,
}

/// Overlay located sections onto the fallback results.
///
/// # Errors
///
/// Returns [`FallbackReason::InvalidShape`] if the merged value no longer
/// deserializes into the result types.
pub fn merge_sections(
    sections: &Sections,
    persona: &PersonaResult,
    plan: &InterventionPlanResult,
) -> Result<Merged, FallbackReason> {
    let mut filled_fields = Vec::new();

    let mut persona_value = to_template(persona)?;
    merge_into(&mut persona_value, &sections.persona, "persona", &mut filled_fields);

    let mut plan_value = to_template(plan)?;
    match &sections.plan {
        Some(provided) => merge_into(&mut plan_value, provided, "interventionPlan", &mut filled_fields),
        None => filled_fields.push("interventionPlan".to_string()),
    }

    Ok(Merged {
        persona: from_merged(persona_value)?,
        intervention_plan: from_merged(plan_value)?,
        filled_fields,
    })
}

fn to_template<T: serde::Serialize>(value: &T) -> Result<Value, FallbackReason> {
    serde_json::to_value(value).map_err(|e| FallbackReason::InvalidShape { message: e.to_string() })
}

fn from_merged<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, FallbackReason> {
    serde_json::from_value(value).map_err(|e| FallbackReason::InvalidShape { message: e.to_string() })
}

/// Overlay `provided` onto `template` in place. Type-mismatched or empty
/// provider values keep the template value and are recorded in `filled`.
pub fn merge_into(template: &mut Value, provided: &Value, path: &str, filled: &mut Vec<String>) {
    match template {
        Value::Object(fields) => match provided {
            Value::Object(given) => merge_object(fields, given, path, filled),
            _ => filled.push(path.to_string()),
        },
        Value::String(current) => match provided {
            Value::String(s) if !s.trim().is_empty() => *current = s.trim().to_string(),
            _ => filled.push(path.to_string()),
        },
        Value::Number(current) => match coerce_number(current, provided) {
            Some(n) => *current = n,
            None => filled.push(path.to_string()),
        },
        Value::Array(items) => match merge_array(items, provided, path) {
            Some(merged) => *items = merged,
            None => filled.push(path.to_string()),
        },
        Value::Bool(current) => match provided {
            Value::Bool(b) => *current = *b,
            _ => filled.push(path.to_string()),
        },
        Value::Null => {}
    }
}

fn merge_object(fields: &mut Map<String, Value>, given: &Map<String, Value>, path: &str, filled: &mut Vec<String>) {
    for (key, slot) in fields.iter_mut() {
        let child = join(path, key);
        match given.get(key) {
            Some(value) => merge_into(slot, value, &child, filled),
            None => filled.push(child),
        }
    }
}

/// Unsigned template numbers only accept non-negative whole provider numbers.
fn coerce_number(template: &serde_json::Number, provided: &Value) -> Option<serde_json::Number> {
    let Value::Number(n) = provided else {
        return None;
    };
    if template.is_u64() {
        if let Some(u) = n.as_u64() {
            return (u <= u64::from(u32::MAX)).then(|| u.into());
        }
        let f = n.as_f64()?;
        if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Some((f as u64).into());
        }
        return None;
    }
    Some(n.clone())
}

/// Arrays of strings take the provider's non-empty strings; arrays of objects
/// merge each provider element over the template element at the same index
/// (or the last one). `None` means nothing usable was provided.
fn merge_array(template: &[Value], provided: &Value, path: &str) -> Option<Vec<Value>> {
    let Value::Array(given) = provided else {
        return None;
    };
    let merged: Vec<Value> = match template.last() {
        Some(Value::Object(_)) => given
            .iter()
            .enumerate()
            .filter(|(_, item)| item.is_object())
            .map(|(i, item)| {
                let mut slot = template.get(i).or(template.last()).cloned().unwrap_or(Value::Null);
                // Element-level gaps are expected; they don't count as provider omissions.
                let mut ignored = Vec::new();
                merge_into(&mut slot, item, &format!("{path}[{i}]"), &mut ignored);
                slot
            })
            .collect(),
        _ => given
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| Value::String(s.to_string()))
            .collect(),
    };
    if merged.is_empty() { None } else { Some(merged) }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() { key.to_string() } else { format!("{path}.{key}") }
}

#[cfg(test)]
#[path = "content_test.rs"]
mod tests;
