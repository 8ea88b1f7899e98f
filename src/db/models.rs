use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    pub primary_key: bool,
}

/// Table name -> columns in catalog order. Serialized as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaSnapshot {
    pub tables: BTreeMap<String, Vec<ColumnInfo>>,
}

impl SchemaSnapshot {
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    #[cfg(test)]
    pub fn columns(&self, table: &str) -> Option<&[ColumnInfo]> {
        self.tables.get(table).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Affected {
        rows_affected: u64,
    },
}

impl QueryResult {
    /// Builds a row result, rejecting any row whose arity differs from the
    /// column list.
    pub fn rows(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self, AppError> {
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(AppError::Query(format!(
                "Row {} has {} values but the result has {} columns",
                index,
                row.len(),
                columns.len()
            )));
        }
        Ok(QueryResult::Rows { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        match self {
            QueryResult::Rows { rows, .. } => rows.len(),
            QueryResult::Affected { .. } => 0,
        }
    }
}
