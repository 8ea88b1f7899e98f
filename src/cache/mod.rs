use std::fs;
use std::path::Path;

use crate::db::models::SchemaSnapshot;
use crate::error::AppError;

/// Overwrites the cache file with the snapshot. Not atomic: a crash while
/// writing leaves a truncated file, which `load` then reports as missing.
pub fn save(snapshot: &SchemaSnapshot, path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }
    let content = serde_json::to_string_pretty(snapshot)
        .map_err(|e| AppError::Storage(e.to_string()))?;
    fs::write(path, content).map_err(|e| {
        AppError::Storage(format!("Failed to write schema cache {}: {}", path.display(), e))
    })?;

    tracing::info!(
        "Wrote structure of {} tables to {}",
        snapshot.table_count(),
        path.display()
    );
    Ok(())
}

pub fn load(path: &Path) -> Result<SchemaSnapshot, AppError> {
    let content = fs::read_to_string(path).map_err(|_| {
        AppError::NotFound(
            "Database structure not found. Please run 'Show DB Structure' first.".to_string(),
        )
    })?;

    serde_json::from_str(&content).map_err(|e| {
        AppError::NotFound(format!(
            "Database structure cache {} is unreadable ({}). Please run 'Show DB Structure' again.",
            path.display(),
            e
        ))
    })
}
