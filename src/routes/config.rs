//! Integration config routes. Credentials never leave the process in clear.

use axum::extract::State;
use axum::response::Json;

use crate::config::{ConfigPatch, IntegrationConfig};
use crate::state::AppState;

/// `GET /api/integrations/config` — current snapshot with keys redacted.
pub async fn get_config(State(state): State<AppState>) -> Json<IntegrationConfig> {
    Json(state.config.get().redacted())
}

/// `PUT /api/integrations/config` — shallow-merge a patch. Redacted keys sent
/// back unchanged leave the stored key alone.
pub async fn update_config(State(state): State<AppState>, Json(patch): Json<ConfigPatch>) -> Json<IntegrationConfig> {
    Json(state.config.update(patch).await.redacted())
}
