//! Output formatters for command results.
//!
//! Every command builds a serializable summary; the formatter walks its
//! JSON value, so new summaries need no formatter changes.

mod summary;

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::cli::OutputFormat;
use crate::core::Result;

pub use summary::{
    CatalogueEntry, ClassRow, MetricDelta, MetricRow, MetricsReport, RunSummary, SearchSummary,
    SeriesStep,
};

/// Output format enum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Format {
    Json,
    #[default]
    Markdown,
    Text,
}

impl From<OutputFormat> for Format {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => Format::Json,
            OutputFormat::Markdown => Format::Markdown,
            OutputFormat::Text => Format::Text,
        }
    }
}

impl Format {
    pub fn format<T: Serialize, W: Write>(&self, data: &T, writer: &mut W) -> Result<()> {
        let value = serde_json::to_value(data)?;
        match self {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, &value)?;
                writeln!(writer)?;
            }
            Format::Markdown => markdown(&value, writer, 2)?,
            Format::Text => text(&value, writer, 0)?,
        }
        Ok(())
    }
}

fn markdown<W: Write>(value: &Value, writer: &mut W, level: usize) -> Result<()> {
    match value {
        Value::Object(map) => {
            let (scalars, nested): (Vec<_>, Vec<_>) =
                map.iter().partition(|(_, v)| is_scalar(v));
            for (key, val) in &scalars {
                writeln!(writer, "- **{}**: {}", title(key), scalar(val))?;
            }
            if !scalars.is_empty() {
                writeln!(writer)?;
            }
            for (key, val) in nested {
                writeln!(writer, "{} {}\n", "#".repeat(level.min(6)), title(key))?;
                markdown(val, writer, level + 1)?;
            }
        }
        Value::Array(items) if items.is_empty() => writeln!(writer, "_None_\n")?,
        Value::Array(items) => match flat_rows(items) {
            Some(rows) => table(&rows, writer)?,
            None => {
                for item in items {
                    markdown(item, writer, level)?;
                }
            }
        },
        other => writeln!(writer, "{}\n", scalar(other))?,
    }
    Ok(())
}

fn table<W: Write>(rows: &[Map<String, Value>], writer: &mut W) -> Result<()> {
    let headers: Vec<&String> = rows[0].keys().collect();
    let header_line: Vec<String> = headers.iter().map(|h| title(h)).collect();
    writeln!(writer, "| {} |", header_line.join(" | "))?;
    writeln!(writer, "|{}", " --- |".repeat(headers.len()))?;
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|h| scalar(row.get(*h).unwrap_or(&Value::Null)))
            .collect();
        writeln!(writer, "| {} |", cells.join(" | "))?;
    }
    writeln!(writer)?;
    Ok(())
}

fn text<W: Write>(value: &Value, writer: &mut W, indent: usize) -> Result<()> {
    let pad = "  ".repeat(indent);
    match value {
        Value::Object(map) => {
            let width = map.keys().map(|k| k.len()).max().unwrap_or(0);
            for (key, val) in map {
                if is_scalar(val) {
                    writeln!(writer, "{pad}{key:<width$}  {}", scalar(val))?;
                } else {
                    writeln!(writer, "{pad}{key}:")?;
                    text(val, writer, indent + 1)?;
                }
            }
        }
        Value::Array(items) => match flat_rows(items) {
            Some(rows) => columns(&rows, writer, &pad)?,
            None => {
                for item in items {
                    writeln!(writer, "{pad}-")?;
                    text(item, writer, indent + 1)?;
                }
            }
        },
        other => writeln!(writer, "{pad}{}", scalar(other))?,
    }
    Ok(())
}

/// Left-aligned columns sized to their widest cell.
fn columns<W: Write>(rows: &[Map<String, Value>], writer: &mut W, pad: &str) -> Result<()> {
    let headers: Vec<&String> = rows[0].keys().collect();
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| scalar(row.get(*h).unwrap_or(&Value::Null)))
                .collect()
        })
        .collect();
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| cells.iter().map(|r| r[i].len()).fold(h.len(), usize::max))
        .collect();

    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, &w)| format!("{v:<w$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };
    writeln!(writer, "{pad}{}", line(headers.iter().map(|h| h.as_str()).collect()))?;
    for row in &cells {
        writeln!(writer, "{pad}{}", line(row.iter().map(String::as_str).collect()))?;
    }
    Ok(())
}

/// Objects whose values are all scalars, as table rows.
fn flat_rows(items: &[Value]) -> Option<Vec<Map<String, Value>>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) if map.values().all(is_scalar) => Some(map.clone()),
            _ => None,
        })
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Object(_) | Value::Array(_))
}

fn title(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars
                .next()
                .map(|first| first.to_uppercase().chain(chars).collect())
                .unwrap_or_default()
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Metric values need more precision than two decimals.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => n
            .as_f64()
            .map(|f| format!("{f:.4}"))
            .unwrap_or_else(|| n.to_string()),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
