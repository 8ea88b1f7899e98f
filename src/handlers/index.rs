use askama::Template;
use axum::extract::State;
use axum::response::Html;
use std::sync::Arc;

use crate::error::AppError;
use crate::handlers::{base_path_url, build_ctx, AppState};
use crate::templates::IndexTemplate;

pub async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let profile = state.database_profile()?;
    let target = if profile.host.is_empty() {
        "not configured".to_string()
    } else {
        format!("{}@{}:{}/{}", profile.user, profile.host, profile.port, profile.database)
    };

    let tpl = IndexTemplate {
        ctx: build_ctx(&state),
        title: "QueryCrafter".to_string(),
        api_url: base_path_url(&state, "/api"),
        settings_url: base_path_url(&state, "/settings"),
        target,
    };

    tpl.render()
        .map(Html)
        .map_err(|e| AppError::Storage(format!("Template error: {}", e)))
}
