use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;
use crate::llm::{CompletionClient, CompletionRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct OpenAiClient {
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

pub fn request_body(request: &CompletionRequest) -> Value {
    serde_json::json!({
        "model": request.model,
        "messages": [
            {"role": "system", "content": request.system},
            {"role": "user", "content": request.prompt},
        ],
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
    })
}

pub fn parse_response(json: &Value) -> Result<String, AppError> {
    json.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| AppError::Generation("Missing choices[0].message.content".to_string()))
}

fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body.trim()))
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AppError> {
        let base_url = request.base_url.trim_end_matches('/');
        let resp = self
            .client
            .post(format!("{}/chat/completions", base_url))
            .bearer_auth(&request.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Generation(error_message(status, &body)));
        }

        let json: Value = resp.json().await?;
        parse_response(&json)
    }
}
