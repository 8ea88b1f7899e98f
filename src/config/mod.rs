use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use crate::settings::{ConnectionProfile, ModelSettings};

const APP_DIR_NAME: &str = "querycrafter";
const DB_SETTINGS_FILE: &str = "db_settings.json";
const MODEL_SETTINGS_FILE: &str = "model_settings.json";
const SCHEMA_FILE: &str = "db_structure.json";

pub fn get_app_dir() -> Result<PathBuf> {
    let base_dir = dirs::config_dir()
        .context("Failed to resolve config directory")?
        .join(APP_DIR_NAME);

    Ok(base_dir)
}

/// Locations of the flat files the application reads and writes.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub db_settings: PathBuf,
    pub model_settings: PathBuf,
    pub schema: PathBuf,
}

impl Paths {
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            db_settings: data_dir.join(DB_SETTINGS_FILE),
            model_settings: data_dir.join(MODEL_SETTINGS_FILE),
            schema: data_dir.join(SCHEMA_FILE),
        }
    }

    pub fn resolve(data_dir: Option<&Path>) -> Result<Self> {
        match data_dir {
            Some(dir) => Ok(Self::in_dir(dir)),
            None => Ok(Self::in_dir(&get_app_dir()?)),
        }
    }
}

pub fn init_directories(paths: &Paths) -> Result<()> {
    if !paths.data_dir.exists() {
        std::fs::create_dir_all(&paths.data_dir)
            .context("Failed to create data directory")?;
        tracing::info!("Created data directory: {}", paths.data_dir.display());
    }
    Ok(())
}

/// Database values taken from the environment (or flags); each one that is
/// set replaces the value stored in the settings file.
#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseOverrides {
    /// MySQL host
    #[arg(id = "db_host", long = "db-host", env = "DB_HOST")]
    pub host: Option<String>,

    /// MySQL port
    #[arg(id = "db_port", long = "db-port", env = "DB_PORT")]
    pub port: Option<u16>,

    /// MySQL user
    #[arg(id = "db_user", long = "db-user", env = "DB_USER")]
    pub user: Option<String>,

    #[arg(id = "db_password", long = "db-password", env = "DB_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database (schema) name
    #[arg(id = "db_database", long = "db-database", env = "DB_DATABASE")]
    pub database: Option<String>,
}

impl DatabaseOverrides {
    pub fn apply(&self, mut profile: ConnectionProfile) -> ConnectionProfile {
        if let Some(host) = &self.host {
            profile.host = host.clone();
        }
        if let Some(port) = self.port {
            profile.port = port;
        }
        if let Some(user) = &self.user {
            profile.user = user.clone();
        }
        if let Some(password) = &self.password {
            profile.password = password.clone();
        }
        if let Some(database) = &self.database {
            profile.database = database.clone();
        }
        profile
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct ModelOverrides {
    #[arg(long = "openai-api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Model identifier sent to the completion endpoint
    #[arg(long = "openai-model", env = "OPENAI_MODEL")]
    pub model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long = "openai-base-url", env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long = "openai-temperature", env = "OPENAI_TEMPERATURE")]
    pub temperature: Option<f32>,
}

impl ModelOverrides {
    pub fn apply(&self, mut settings: ModelSettings) -> ModelSettings {
        if let Some(api_key) = &self.api_key {
            settings.api_key = api_key.clone();
        }
        if let Some(model) = &self.model {
            settings.model = model.clone();
        }
        if let Some(base_url) = &self.base_url {
            settings.base_url = Some(base_url.clone());
        }
        if let Some(temperature) = self.temperature {
            settings.temperature = temperature;
        }
        settings
    }
}
