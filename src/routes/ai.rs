//! AI analysis route.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use serde_json::Value;

use super::ApiError;
use crate::llm::types::{AnalysisOutcome, AnalysisRequest};
use crate::state::AppState;

/// Request body; unset tunables come from the current AI settings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    #[serde(default)]
    pub subject_context: Value,
    pub prompt_template: Option<String>,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub timeout_ms: Option<u64>,
}

impl AnalyzeBody {
    fn into_request(self, state: &AppState) -> AnalysisRequest {
        let config = state.config.get();
        let mut request = AnalysisRequest::new(self.subject_context, &config.ai);
        if let Some(template) = self.prompt_template {
            request.prompt_template = template;
        }
        if let Some(temperature) = self.temperature {
            request.temperature = temperature;
        }
        if let Some(max) = self.max_output_tokens {
            request.max_output_tokens = max;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            request.timeout_ms = timeout_ms;
        }
        request
    }
}

/// `POST /api/ai/analyze` — persona and intervention plan, provider or fallback.
pub async fn analyze(State(state): State<AppState>, Json(body): Json<AnalyzeBody>) -> Result<Json<AnalysisOutcome>, ApiError> {
    let request = body.into_request(&state);
    Ok(Json(state.gateway.generate(&request).await?))
}
