use serde_json::Value;

use crate::error::AppError;

/// Renders exported result data as CSV. Accepted shapes:
/// an array of objects (keys of the first object form the header),
/// an array of arrays (the first array is the header), or
/// an object `{columns, rows}` as returned by `run_query`.
pub fn to_csv(data: &Value) -> Result<String, AppError> {
    let (header, rows) = tabulate(data)?;

    let mut out = String::new();
    write_record(&mut out, header);
    for row in &rows {
        write_record(&mut out, row.iter().map(cell_text));
    }
    Ok(out)
}

fn tabulate(data: &Value) -> Result<(Vec<String>, Vec<Vec<Value>>), AppError> {
    match data {
        Value::Object(map) if map.contains_key("columns") => {
            let header = map
                .get("columns")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid("`columns` must be an array"))?
                .iter()
                .map(cell_text)
                .collect();
            let rows = match map.get("rows") {
                Some(Value::Array(rows)) => rows
                    .iter()
                    .map(|row| row.as_array().cloned().ok_or_else(|| invalid("rows must be arrays")))
                    .collect::<Result<Vec<_>, _>>()?,
                None | Some(Value::Null) => Vec::new(),
                Some(_) => return Err(invalid("`rows` must be an array")),
            };
            Ok((header, rows))
        }
        Value::Array(items) => match items.first() {
            None => Err(invalid("No data to export.")),
            Some(Value::Object(first)) => {
                let header: Vec<String> = first.keys().cloned().collect();
                let rows = items
                    .iter()
                    .map(|item| -> Result<Vec<Value>, AppError> {
                        let obj = item
                            .as_object()
                            .ok_or_else(|| invalid("rows must all be objects"))?;
                        Ok(header
                            .iter()
                            .map(|key| obj.get(key).cloned().unwrap_or(Value::Null))
                            .collect())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((header, rows))
            }
            Some(Value::Array(first)) => {
                let header = first.iter().map(cell_text).collect();
                let rows = items[1..]
                    .iter()
                    .map(|row| row.as_array().cloned().ok_or_else(|| invalid("rows must all be arrays")))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok((header, rows))
            }
            Some(_) => Err(invalid("rows must be objects or arrays")),
        },
        _ => Err(invalid("expected a JSON array of rows")),
    }
}

fn invalid(reason: &str) -> AppError {
    AppError::InvalidInput(format!("Cannot export CSV: {}", reason))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_record(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let line = fields
        .into_iter()
        .map(|field| escape(&field))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
