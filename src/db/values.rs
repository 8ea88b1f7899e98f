use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

const SIGNED_INTEGER_TYPES: &[&str] = &[
    "BOOLEAN", "TINYINT", "SMALLINT", "MEDIUMINT", "INT", "BIGINT", "YEAR",
];

/// Converts one result cell into JSON. Rows come from the text protocol, so
/// anything that is not a plain number is rendered as the server's text.
pub fn column_value(row: &MySqlRow, index: usize) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(_) => {}
        Err(e) => {
            tracing::debug!("Failed to read column {}: {}", index, e);
            return Value::Null;
        }
    }

    let type_name = row.columns()[index].type_info().name().to_ascii_uppercase();

    if type_name.ends_with("UNSIGNED") {
        if let Ok(v) = row.try_get_unchecked::<u64, _>(index) {
            return Value::from(v);
        }
    } else if SIGNED_INTEGER_TYPES.contains(&type_name.as_str()) {
        if let Ok(v) = row.try_get_unchecked::<i64, _>(index) {
            return Value::from(v);
        }
    } else if type_name == "FLOAT" || type_name == "DOUBLE" {
        if let Ok(v) = row.try_get_unchecked::<f64, _>(index) {
            return Value::from(v);
        }
    }

    match row.try_get_unchecked::<String, _>(index) {
        Ok(text) => Value::String(text),
        Err(_) => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null),
    }
}

pub fn column_names(row: &MySqlRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}
