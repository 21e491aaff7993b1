//! Deterministic persona and intervention-plan generator.
//!
//! DESIGN
//! ======
//! Used whenever a provider call is skipped or unusable, and as the
//! template that fills gaps in partial provider output. Output depends only
//! on the subject context, never on time or randomness, so the same patient
//! always gets the same fallback. Every field is populated even for an
//! empty context.

use serde_json::Value;

use super::types::{
    CounselingStrategy, InterventionPhase, InterventionPlanResult, PersonaResult, PsychologicalProfile,
};

const HIGH: &str = "High";
const MODERATE: &str = "Moderate";
const LOW: &str = "Low";

/// Everything the generator reads from the context.
struct Signals {
    first_name: String,
    last_name: String,
    anxiety_score: Option<f64>,
    depression_score: Option<f64>,
    stress_score: Option<f64>,
    previous_cycles: u32,
    has_partner: bool,
    treatment: Option<String>,
}

impl Signals {
    fn read(ctx: &Value) -> Self {
        Self {
            first_name: text_at(ctx, &["/personalInfo/firstName", "/firstName"]).unwrap_or_default(),
            last_name: text_at(ctx, &["/personalInfo/lastName", "/lastName"]).unwrap_or_default(),
            anxiety_score: score(ctx, "anxietyScore"),
            depression_score: score(ctx, "depressionScore"),
            stress_score: score(ctx, "stressScore"),
            previous_cycles: previous_cycles(ctx),
            has_partner: has_partner(ctx),
            treatment: text_at(ctx, &["/currentTreatment/type", "/treatment/type", "/treatmentType"]),
        }
    }

    /// First and last name joined by a single space, kept verbatim even when one is empty.
    fn patient_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn display_name(&self, default: &str) -> String {
        let name = self.patient_name();
        let trimmed = name.trim();
        if trimmed.is_empty() { default.to_string() } else { trimmed.to_string() }
    }

    /// GAD-7 bands.
    fn anxiety_level(&self) -> &'static str {
        match self.anxiety_score {
            Some(s) if s >= 10.0 => HIGH,
            Some(s) if s >= 5.0 => MODERATE,
            Some(_) => LOW,
            None => MODERATE,
        }
    }

    /// 0–10 self-report; repeated cycles push an unknown score to high.
    fn stress_level(&self) -> &'static str {
        match self.stress_score {
            Some(s) if s >= 7.0 => HIGH,
            Some(s) if s >= 4.0 => MODERATE,
            Some(_) => LOW,
            None if self.previous_cycles >= 2 => HIGH,
            None => self.anxiety_level(),
        }
    }

    /// PHQ-9 moderate or worse.
    fn depressive_symptoms(&self) -> bool {
        self.depression_score.is_some_and(|s| s >= 10.0)
    }

    fn high_anxiety(&self) -> bool {
        self.anxiety_level() == HIGH
    }
}

// =============================================================================
// PERSONA
// =============================================================================

#[must_use]
pub fn persona(ctx: &Value) -> PersonaResult {
    let s = Signals::read(ctx);

    let coping_style = if s.depressive_symptoms() {
        "Withdrawal-oriented; benefits from structured support"
    } else if s.high_anxiety() {
        "Information-seeking with heightened vigilance"
    } else {
        "Problem-focused and adaptive"
    };
    let emotional_state = if s.depressive_symptoms() {
        "Low mood with signs of depressive symptoms"
    } else if s.high_anxiety() {
        "Anxious and apprehensive about treatment outcomes"
    } else {
        "Cautiously hopeful"
    };
    let support_system = if s.has_partner {
        "Partner involved in treatment decisions"
    } else {
        "Support network not yet described"
    };

    let mut traits = vec!["Goal-oriented".to_string(), "Detail-focused".to_string()];
    if s.high_anxiety() {
        traits.push("Vigilant about treatment details".to_string());
    }
    traits.push(if s.previous_cycles > 0 {
        "Persistent through repeated treatment".to_string()
    } else {
        "New to fertility treatment".to_string()
    });

    let mut motivations = vec!["Desire to build a family".to_string(), "Trust in the care team".to_string()];
    if s.has_partner {
        motivations.push("Shared commitment with partner".to_string());
    }

    let mut concerns = vec!["Uncertainty about treatment success".to_string()];
    if s.previous_cycles > 0 {
        concerns.push("Fear of another unsuccessful cycle".to_string());
    }
    if s.treatment.is_some() {
        concerns.push("Managing medication side effects".to_string());
    }
    concerns.push("Balancing treatment with work and daily life".to_string());

    let communication = if s.high_anxiety() {
        vec!["Clear, step-by-step explanations".to_string(), "Written summaries after appointments".to_string()]
    } else {
        vec!["Open, collaborative discussion".to_string(), "Regular check-ins between appointments".to_string()]
    };

    let treatment_phrase = match &s.treatment {
        Some(t) => format!("undergoing {t}"),
        None => "preparing for fertility treatment".to_string(),
    };
    let summary = format!(
        "{} is {treatment_phrase} with {} stress and {} anxiety{}.",
        s.display_name("The patient"),
        s.stress_level().to_lowercase(),
        s.anxiety_level().to_lowercase(),
        if s.previous_cycles > 0 {
            format!(" after {} previous cycle(s)", s.previous_cycles)
        } else {
            String::new()
        },
    );

    PersonaResult {
        patient_name: s.patient_name(),
        psychological_profile: PsychologicalProfile {
            stress_level: s.stress_level().to_string(),
            anxiety_level: s.anxiety_level().to_string(),
            coping_style: coping_style.to_string(),
            emotional_state: emotional_state.to_string(),
            support_system: support_system.to_string(),
        },
        personality_traits: traits,
        motivational_factors: motivations,
        primary_concerns: concerns,
        communication_preferences: communication,
        summary,
    }
}

// =============================================================================
// INTERVENTION PLAN
// =============================================================================

#[must_use]
pub fn intervention_plan(ctx: &Value) -> InterventionPlanResult {
    let s = Signals::read(ctx);

    let mut goals = vec![
        "Reduce treatment-related distress".to_string(),
        "Strengthen coping strategies".to_string(),
        "Support informed decision-making".to_string(),
    ];
    if s.has_partner {
        goals.push("Enhance couple communication".to_string());
    }

    let support_weeks = if s.high_anxiety() || s.stress_level() == HIGH { 6 } else { 4 };
    let phases = vec![
        phase(
            "Assessment & Rapport",
            2,
            "Establish baseline wellbeing and counseling goals",
            &["Baseline psychological assessment", "Psychoeducation on the treatment process"],
        ),
        phase(
            "Treatment Support",
            support_weeks,
            "Coping skills during stimulation and procedures",
            &["Weekly coping skills sessions", "Stress-reduction practice"],
        ),
        phase(
            "Two-Week Wait",
            2,
            "Managing uncertainty while awaiting results",
            &["Mindfulness for uncertainty", "Mid-wait check-in call"],
        ),
        phase(
            "Outcome Integration",
            4,
            "Processing results and planning next steps",
            &["Outcome debrief session", "Next-step decision support"],
        ),
    ];

    let mut strategies = vec![strategy(
        "Psychoeducation",
        "Explain each treatment stage and what to expect emotionally",
        "Each phase",
    )];
    if s.anxiety_level() != LOW {
        strategies.push(strategy(
            "Cognitive Behavioral Therapy",
            "Identify and reframe catastrophic thinking about outcomes",
            "Weekly",
        ));
    }
    if s.depressive_symptoms() {
        strategies.push(strategy(
            "Behavioral Activation",
            "Schedule valued activities to counter withdrawal and low mood",
            "Weekly",
        ));
    }
    if s.stress_level() == HIGH {
        strategies.push(strategy(
            "Mindfulness-Based Stress Reduction",
            "Brief guided practices for acute treatment stress",
            "Daily practice",
        ));
    }
    if s.has_partner {
        strategies.push(strategy(
            "Couples Communication Sessions",
            "Align expectations and share decision-making with partner",
            "Every two weeks",
        ));
    }
    strategies.push(strategy(
        "Supportive Counseling",
        "Validate emotional experience and monitor wellbeing",
        "Every session",
    ));

    let follow_up = if s.high_anxiety() || s.depressive_symptoms() {
        "Reassess wellbeing scores at the end of each phase and within one week of results"
    } else {
        "Reassess wellbeing scores at the end of each phase"
    };

    InterventionPlanResult {
        title: format!("Fertility Counseling Plan for {}", s.display_name("Patient")),
        goals,
        phases,
        strategies,
        follow_up: follow_up.to_string(),
    }
}

fn phase(name: &str, weeks: u32, focus: &str, activities: &[&str]) -> InterventionPhase {
    InterventionPhase {
        name: name.to_string(),
        duration_weeks: weeks,
        focus: focus.to_string(),
        activities: activities.iter().map(|a| (*a).to_string()).collect(),
    }
}

fn strategy(name: &str, description: &str, frequency: &str) -> CounselingStrategy {
    CounselingStrategy {
        name: name.to_string(),
        description: description.to_string(),
        frequency: frequency.to_string(),
    }
}

// =============================================================================
// CONTEXT READERS
// =============================================================================

fn text_at(ctx: &Value, pointers: &[&str]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|p| ctx.pointer(p))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn score(ctx: &Value, name: &str) -> Option<f64> {
    ["/assessmentScores", "/assessments", ""]
        .iter()
        .filter_map(|prefix| ctx.pointer(&format!("{prefix}/{name}")))
        .find_map(number)
}

fn previous_cycles(ctx: &Value) -> u32 {
    ["/medicalHistory/previousCycles", "/treatmentHistory/previousCycles", "/previousCycles"]
        .iter()
        .filter_map(|p| ctx.pointer(p))
        .find_map(|v| match v {
            Value::Array(items) => u32::try_from(items.len()).ok(),
            other => number(other).filter(|n| n.is_finite() && *n >= 0.0).map(|n| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let count = n.min(f64::from(u32::MAX)) as u32;
                count
            }),
        })
        .unwrap_or(0)
}

fn has_partner(ctx: &Value) -> bool {
    if text_at(ctx, &["/personalInfo/partnerName", "/partnerName"]).is_some() {
        return true;
    }
    text_at(ctx, &["/personalInfo/relationshipStatus", "/relationshipStatus"])
        .is_some_and(|status| matches!(status.to_ascii_lowercase().as_str(), "married" | "partnered" | "couple"))
}

#[cfg(test)]
#[path = "fallback_test.rs"]
mod tests;
