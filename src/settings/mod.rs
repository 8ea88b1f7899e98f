use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

use crate::error::AppError;

pub const DEFAULT_MYSQL_PORT: u16 = 3306;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Credentials for one MySQL target, stored as plain JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionProfile {
    pub host: String,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl Default for ConnectionProfile {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_MYSQL_PORT,
            user: String::new(),
            password: String::new(),
            database: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            base_url: None,
        }
    }
}

// Older settings files wrote the port as a string.
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    Ok(match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => port,
        RawPort::Text(text) => text.trim().parse().unwrap_or(DEFAULT_MYSQL_PORT),
    })
}

fn load_or_default<T>(path: &Path) -> Result<T, AppError>
where
    T: Default + for<'de> Deserialize<'de>,
{
    if !path.exists() {
        tracing::debug!("Settings file {} not found, using defaults", path.display());
        return Ok(T::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| AppError::Storage(format!("Failed to parse {}: {}", path.display(), e)))
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Storage(e.to_string()))?;
    fs::write(path, content)
        .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", path.display(), e)))
}

pub fn load_database_profile(path: &Path) -> Result<ConnectionProfile, AppError> {
    load_or_default(path)
}

pub fn save_database_profile(profile: &ConnectionProfile, path: &Path) -> Result<(), AppError> {
    save_json(profile, path)?;
    tracing::info!("Saved database settings to {}", path.display());
    Ok(())
}

pub fn load_model_settings(path: &Path) -> Result<ModelSettings, AppError> {
    load_or_default(path)
}

pub fn save_model_settings(settings: &ModelSettings, path: &Path) -> Result<(), AppError> {
    save_json(settings, path)?;
    tracing::info!("Saved model settings to {}", path.display());
    Ok(())
}
