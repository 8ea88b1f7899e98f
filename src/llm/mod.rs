pub mod openai;

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use crate::db::models::SchemaSnapshot;
use crate::error::AppError;
use crate::settings::ModelSettings;

/// Upper bound on generated tokens; keeps a runaway completion short.
pub const MAX_COMPLETION_TOKENS: u32 = 300;

const SYSTEM_PROMPT: &str = "You are an expert SQL query generator for the MySQL dialect. \
Understand the user's intent and answer with a single valid, optimized SQL query. \
Output only SQL: no explanations, no comments, no markdown.";

// First fenced block. A lone word on the opening line is a language tag; on a
// one-line fence only a SQL dialect name is. Closing fence optional (truncated replies).
static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*(?:[A-Za-z0-9_+-]+[ \t]*\r?\n|(?i:sql|mysql|mariadb)\b)?(.*?)(?:```|\z)")
        .expect("code fence pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// A hosted text-completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError>;
}

pub fn build_prompt(
    question: &str,
    snapshot: &SchemaSnapshot,
    database: &str,
) -> Result<String, AppError> {
    let schema = serde_json::to_string(snapshot)
        .map_err(|e| AppError::Generation(format!("Failed to serialize schema: {}", e)))?;

    Ok(format!(
        "DB: {database}\n\
         Schema: {schema}\n\
         \n\
         Write an optimized SQL query to answer: \"{question}\"\n\
         \n\
         Rules:\n\
         - Use valid MySQL syntax for this DB\n\
         - Include joins/subqueries if needed\n\
         - Output only the SQL query (no text/comments)\n\
         - End with a semicolon",
        question = question.trim(),
    ))
}

/// Removes a markdown code fence (and its language tag) around the reply.
pub fn strip_code_fence(reply: &str) -> String {
    match CODE_FENCE.captures(reply) {
        Some(caps) => caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
        None => reply.trim().to_string(),
    }
}

pub fn require_api_key(settings: &ModelSettings) -> Result<(), AppError> {
    if settings.api_key.trim().is_empty() {
        return Err(AppError::Generation(
            "API key is not configured. Set OPENAI_API_KEY or save it in Settings.".to_string(),
        ));
    }
    Ok(())
}

/// Asks the completion endpoint for a query answering `question` against the
/// cached schema. One call, no retry, no validation of the returned SQL.
pub async fn generate(
    client: &dyn CompletionClient,
    question: &str,
    snapshot: &SchemaSnapshot,
    database: &str,
    settings: &ModelSettings,
) -> Result<String, AppError> {
    require_api_key(settings)?;

    let request = CompletionRequest {
        base_url: settings
            .base_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| openai::DEFAULT_BASE_URL.to_string()),
        api_key: settings.api_key.trim().to_string(),
        model: settings.model.clone(),
        system: SYSTEM_PROMPT.to_string(),
        prompt: build_prompt(question, snapshot, database)?,
        temperature: settings.temperature.clamp(0.0, 2.0),
        max_tokens: MAX_COMPLETION_TOKENS,
    };

    tracing::info!(
        "Generating query with model {} ({} tables in schema)",
        request.model,
        snapshot.table_count()
    );

    let reply = client.complete(&request).await.map_err(|e| match e {
        AppError::Generation(msg) => AppError::Generation(msg),
        other => AppError::Generation(other.to_string()),
    })?;
    Ok(strip_code_fence(&reply))
}
