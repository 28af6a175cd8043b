//! CSV loader: one record per row

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::tabular::{table_to_records, Table, TabularOptions};
use super::LoadedSource;
use crate::error::LoadError;
use crate::types::Metadata;

/// CSV parsing options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvOptions {
    /// Field delimiter (default `,`)
    #[serde(default)]
    pub delimiter: Option<char>,
    /// Content selection
    #[serde(default, flatten)]
    pub tabular: TabularOptions,
}

/// Load a CSV file from disk
pub fn load_csv(path: &Path, options: &CsvOptions) -> Result<LoadedSource, LoadError> {
    let origin = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| LoadError::unreadable(&origin, e.to_string()))?;
    parse_csv(&data, &origin, options)
}

/// Parse CSV bytes; `origin` is stamped as the record source
pub fn parse_csv(data: &[u8], origin: &str, options: &CsvOptions) -> Result<LoadedSource, LoadError> {
    let delimiter = match options.delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => {
            return Err(LoadError::unreadable(
                origin,
                format!("delimiter '{}' is not a single-byte character", c),
            ))
        }
        None => b',',
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(data);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| LoadError::unreadable(origin, e.to_string()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    let mut dropped = 0;
    for (line, result) in reader.records().enumerate() {
        match result {
            Ok(record) => {
                if record.iter().all(|field| field.trim().is_empty()) {
                    dropped += 1;
                    continue;
                }
                rows.push(
                    (0..columns.len())
                        .map(|i| Value::String(record.get(i).unwrap_or_default().to_string()))
                        .collect(),
                );
            }
            Err(e) => {
                dropped += 1;
                tracing::warn!("[{}] CSV parse warning at row {}: {}", origin, line + 1, e);
            }
        }
    }

    tracing::info!(
        "[{}] Parsed {} rows ({} blank or malformed), columns: {}",
        origin,
        rows.len(),
        dropped,
        columns.join(", ")
    );

    let table = Table { columns, rows };
    let csv_columns = table.columns.join(",");

    let mut loaded = table_to_records(&table, &options.tabular, origin, |idx| {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), Value::from(origin));
        metadata.insert("row".into(), Value::from(idx + 1));
        metadata.insert("csv_columns".into(), Value::from(csv_columns.as_str()));
        metadata
    })?;
    loaded.skipped += dropped;
    Ok(loaded)
}
