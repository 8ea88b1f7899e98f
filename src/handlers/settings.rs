use askama::Template;
use axum::extract::State;
use axum::response::Html;
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::db;
use crate::error::AppError;
use crate::handlers::{build_ctx, non_empty, AppState};
use crate::settings::{self, ConnectionProfile, ModelSettings, DEFAULT_MYSQL_PORT};
use crate::templates::SettingsTemplate;

#[derive(Deserialize)]
pub struct DatabaseForm {
    host: Option<String>,
    port: Option<String>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
}

#[derive(Deserialize)]
pub struct ModelForm {
    api_key: Option<String>,
    model: Option<String>,
    temperature: Option<String>,
    base_url: Option<String>,
}

pub async fn settings_page(State(state): State<Arc<AppState>>) -> Result<Html<String>, AppError> {
    let tpl = SettingsTemplate {
        ctx: build_ctx(&state),
        title: "Settings | QueryCrafter".to_string(),
    };

    tpl.render()
        .map(Html)
        .map_err(|e| AppError::Storage(format!("Template error: {}", e)))
}

pub async fn get_database(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let profile = settings::load_database_profile(&state.paths.db_settings)?;
    Ok(Json(json!({
        "host": profile.host,
        "port": profile.port,
        "user": profile.user,
        "database": profile.database,
        "password_set": !profile.password.is_empty(),
    })))
}

/// Builds a profile from the submitted form. A blank password keeps the
/// stored one, since reads never send it back.
fn profile_from_form(state: &AppState, form: DatabaseForm) -> Result<ConnectionProfile, AppError> {
    let stored = settings::load_database_profile(&state.paths.db_settings)?;

    let port = match non_empty(form.port) {
        Some(port) => port.trim().parse::<u16>().map_err(|_| {
            AppError::InvalidInput(format!("Port must be a number between 1 and 65535, got {}", port))
        })?,
        None => DEFAULT_MYSQL_PORT,
    };

    Ok(ConnectionProfile {
        host: form.host.unwrap_or_default().trim().to_string(),
        port,
        user: form.user.unwrap_or_default().trim().to_string(),
        password: non_empty(form.password).unwrap_or(stored.password),
        database: form.database.unwrap_or_default().trim().to_string(),
    })
}

pub async fn save_database(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DatabaseForm>,
) -> Result<Json<Value>, AppError> {
    let profile = profile_from_form(&state, form)?;
    settings::save_database_profile(&profile, &state.paths.db_settings)?;
    Ok(Json(json!({ "message": "Settings saved successfully!" })))
}

pub async fn test_database(
    State(state): State<Arc<AppState>>,
    Form(form): Form<DatabaseForm>,
) -> Result<Json<Value>, AppError> {
    let profile = profile_from_form(&state, form)?;
    db::test_connection(&profile).await?;
    tracing::info!("Connection test to {}:{} succeeded", profile.host, profile.port);
    Ok(Json(json!({ "message": "Connection successful!" })))
}

pub async fn get_model(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    let model = settings::load_model_settings(&state.paths.model_settings)?;
    Ok(Json(json!({
        "model": model.model,
        "temperature": model.temperature,
        "base_url": model.base_url,
        "api_key_set": !model.api_key.is_empty(),
    })))
}

pub async fn save_model(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ModelForm>,
) -> Result<Json<Value>, AppError> {
    let stored = settings::load_model_settings(&state.paths.model_settings)?;
    let defaults = ModelSettings::default();

    let temperature = match non_empty(form.temperature) {
        Some(t) => t
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|t| (0.0..=2.0).contains(t))
            .ok_or_else(|| {
                AppError::InvalidInput("Temperature must be a number between 0 and 2".to_string())
            })?,
        None => defaults.temperature,
    };

    let updated = ModelSettings {
        api_key: non_empty(form.api_key)
            .map(|k| k.trim().to_string())
            .unwrap_or(stored.api_key),
        model: non_empty(form.model)
            .map(|m| m.trim().to_string())
            .unwrap_or(defaults.model),
        temperature,
        base_url: non_empty(form.base_url).map(|u| u.trim().to_string()),
    };

    settings::save_model_settings(&updated, &state.paths.model_settings)?;
    Ok(Json(json!({ "message": "Settings saved successfully!" })))
}
