//! Output formatting helpers for human-readable and JSON output.

use bookit::ChangeSet;
use serde_json::{Value, json};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Print a table with aligned columns in human-readable format.
///
/// `headers` and each row in `rows` must have the same length.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }

    let col_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let render = |cells: Vec<String>| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    println!("{}", render(headers.iter().map(|h| h.to_string()).collect()));
    for row in rows {
        println!("{}", render(row.iter().take(col_count).cloned().collect()));
    }
}

/// Compact single-cell rendering of a JSON value
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "-".to_owned(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Print the events a write section fired, in firing order
pub fn print_changes(changes: &ChangeSet, format: OutputFormat) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Human => {
            if changes.is_empty() {
                println!("No changes");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = changes
                .events()
                .iter()
                .map(|event| {
                    vec![
                        event.key.to_string(),
                        event.id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_owned()),
                        cell(event.previous.as_ref()),
                        cell(event.value.as_ref()),
                    ]
                })
                .collect();
            print_table(&["EVENT", "ID", "BEFORE", "AFTER"], &rows);
        }
        OutputFormat::Json => {
            let events: Vec<Value> = changes
                .events()
                .iter()
                .map(|event| {
                    json!({
                        "key": event.key.to_string(),
                        "id": event.id,
                        "previous": event.previous,
                        "value": event.value,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string(&events)?);
        }
    }
    Ok(())
}
