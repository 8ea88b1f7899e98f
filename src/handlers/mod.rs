pub mod api;
pub mod health;
pub mod index;
pub mod settings;

use axum::routing::{get, get_service, post};
use axum::Router;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{DatabaseOverrides, ModelOverrides, Paths};
use crate::error::AppError;
use crate::llm::CompletionClient;
use crate::settings::{ConnectionProfile, ModelSettings};
use crate::templates::AppContext;

pub struct AppState {
    pub paths: Paths,
    pub database_overrides: DatabaseOverrides,
    pub model_overrides: ModelOverrides,
    pub completion: Arc<dyn CompletionClient>,
    pub base_path: String,
}

impl AppState {
    /// Stored profile with environment overrides applied. Read fresh for
    /// every action so edits in Settings take effect immediately.
    pub fn database_profile(&self) -> Result<ConnectionProfile, AppError> {
        let stored = crate::settings::load_database_profile(&self.paths.db_settings)?;
        Ok(self.database_overrides.apply(stored))
    }

    pub fn model_settings(&self) -> Result<ModelSettings, AppError> {
        let stored = crate::settings::load_model_settings(&self.paths.model_settings)?;
        Ok(self.model_overrides.apply(stored))
    }
}

pub fn build_ctx(state: &Arc<AppState>) -> AppContext {
    AppContext {
        base_path: state.base_path.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

pub fn base_path_url(state: &Arc<AppState>, path: &str) -> String {
    if state.base_path == "/" {
        path.to_string()
    } else {
        format!("{}{}", state.base_path, path)
    }
}

/// Form fields arrive as empty strings when left blank.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let router = Router::new()
        .route("/", get(index::index))
        .route("/api", post(api::api))
        .route("/settings", get(settings::settings_page))
        .route(
            "/settings/database",
            get(settings::get_database).post(settings::save_database),
        )
        .route("/settings/database/test", post(settings::test_database))
        .route(
            "/settings/model",
            get(settings::get_model).post(settings::save_model),
        )
        .route("/healthz", get(health::healthz))
        .nest_service("/static", get_service(ServeDir::new("static")))
        .with_state(state.clone());

    let app = if state.base_path == "/" {
        router
    } else {
        Router::new().nest(&state.base_path, router)
    };
    app.layer(TraceLayer::new_for_http())
}
