use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

use crate::cache;
use crate::db::{self, models::QueryResult};
use crate::error::AppError;
use crate::handlers::{non_empty, AppState};
use crate::llm;
use crate::utils::csv;

const EXPORT_FILE_NAME: &str = "exported_data.csv";

#[derive(Debug, Deserialize)]
pub struct ApiForm {
    action: Option<String>,
    query: Option<String>,
    question: Option<String>,
    data: Option<String>,
}

/// Single multiplexed endpoint; the `action` field selects the operation.
pub async fn api(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ApiForm>,
) -> Result<Response, AppError> {
    let action = form.action.as_deref().unwrap_or_default();
    tracing::info!("Received action: {}", action);

    match action {
        "run_query" => run_query(&state, form.query).await,
        "show_db_structure" => show_db_structure(&state).await,
        "generate_query" => generate_query(&state, form.question).await,
        "export_csv" => export_csv(form.data),
        _ => Err(AppError::InvalidInput("Invalid action.".to_string())),
    }
}

async fn run_query(state: &AppState, query: Option<String>) -> Result<Response, AppError> {
    let query = non_empty(query)
        .ok_or_else(|| AppError::InvalidInput("Query cannot be empty.".to_string()))?;
    let profile = state.database_profile()?;

    let started = Instant::now();
    let result = db::with_connection(&profile, move |conn| {
        Box::pin(async move { conn.execute(&query).await })
    })
    .await?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let body = match result {
        QueryResult::Rows { columns, rows } => {
            tracing::info!("Query returned {} rows in {} ms", rows.len(), elapsed_ms);
            json!({ "columns": columns, "rows": rows, "elapsed_ms": elapsed_ms })
        }
        QueryResult::Affected { rows_affected } => {
            tracing::info!("Statement affected {} rows in {} ms", rows_affected, elapsed_ms);
            json!({
                "message": "Query executed successfully.",
                "rows_affected": rows_affected,
                "elapsed_ms": elapsed_ms,
            })
        }
    };
    Ok(Json(body).into_response())
}

async fn show_db_structure(state: &AppState) -> Result<Response, AppError> {
    let profile = state.database_profile()?;
    let snapshot =
        db::with_connection(&profile, |conn| Box::pin(db::fetch_schema(conn))).await?;

    cache::save(&snapshot, &state.paths.schema)?;
    Ok(Json(json!({ "structure": snapshot })).into_response())
}

async fn generate_query(state: &AppState, question: Option<String>) -> Result<Response, AppError> {
    let question = non_empty(question).ok_or_else(|| {
        AppError::InvalidInput("Please enter a prompt to generate a query.".to_string())
    })?;

    let settings = state.model_settings()?;
    llm::require_api_key(&settings)?;
    let snapshot = cache::load(&state.paths.schema)?;
    let profile = state.database_profile()?;
    db::validate_profile(&profile)?;

    let query = llm::generate(
        state.completion.as_ref(),
        &question,
        &snapshot,
        &profile.database,
        &settings,
    )
    .await?;
    Ok(Json(json!({ "query": query })).into_response())
}

fn export_csv(data: Option<String>) -> Result<Response, AppError> {
    let data =
        non_empty(data).ok_or_else(|| AppError::InvalidInput("No data to export.".to_string()))?;
    let value: serde_json::Value = serde_json::from_str(&data)
        .map_err(|e| AppError::InvalidInput(format!("Cannot export CSV: {}", e)))?;
    let body = csv::to_csv(&value)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        body,
    )
        .into_response())
}
