//! Content-field resolution shared by CSV, dataset and in-memory row sources

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::LoadedSource;
use crate::error::LoadError;
use crate::types::{Metadata, RawRecord};

/// Column names treated as content when none is declared (case-insensitive)
pub const CANONICAL_CONTENT_FIELDS: &[&str] =
    &["text", "content", "body", "description", "message", "document"];

/// A value must be longer than this to be picked as content by length
pub const SUBSTANTIAL_TEXT_LEN: usize = 50;

/// Rows whose skip reason is logged individually
const LOGGED_SKIPS: usize = 5;

/// How tabular rows become record text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabularOptions {
    /// Column holding the content
    #[serde(default)]
    pub content_field: Option<String>,
    /// Render every column as `name: value` lines
    #[serde(default)]
    pub combine_columns: bool,
    /// Restrict metadata to these columns
    #[serde(default)]
    pub metadata_fields: Option<Vec<String>>,
}

/// Column-aligned rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table from JSON objects, keeping first-seen column order
    pub fn from_objects(objects: &[serde_json::Map<String, Value>]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for object in objects {
            for key in object.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = objects
            .iter()
            .map(|object| {
                columns
                    .iter()
                    .map(|c| object.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Self { columns, rows }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// Strategy chosen once per load and applied to every row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStrategy {
    /// Take the text of one column
    Column(usize),
    /// Join non-empty `column: value` lines
    Combine,
}

/// Decide the content strategy for a whole table
///
/// Order: declared field (must exist), combine flag, canonical column name,
/// first column holding a value longer than [`SUBSTANTIAL_TEXT_LEN`] in row
/// order, then combine.
pub fn resolve_strategy(
    table: &Table,
    options: &TabularOptions,
    origin: &str,
) -> Result<ContentStrategy, LoadError> {
    if let Some(field) = &options.content_field {
        return table
            .column_index(field)
            .map(ContentStrategy::Column)
            .ok_or_else(|| LoadError::MissingContentField {
                origin: origin.to_string(),
                field: field.clone(),
                available: table.columns.clone(),
            });
    }

    if options.combine_columns {
        return Ok(ContentStrategy::Combine);
    }

    if let Some(idx) = table.columns.iter().position(|c| {
        CANONICAL_CONTENT_FIELDS.contains(&c.to_lowercase().as_str())
    }) {
        return Ok(ContentStrategy::Column(idx));
    }

    let by_length = table.rows.iter().find_map(|row| {
        row.iter()
            .position(|v| value_text(v).chars().count() > SUBSTANTIAL_TEXT_LEN)
    });

    Ok(by_length.map_or(ContentStrategy::Combine, ContentStrategy::Column))
}

/// Plain-text rendering of a cell
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn row_content(table: &Table, row: &[Value], strategy: ContentStrategy) -> String {
    match strategy {
        ContentStrategy::Column(idx) => row.get(idx).map(value_text).unwrap_or_default(),
        ContentStrategy::Combine => table
            .columns
            .iter()
            .zip(row)
            .filter_map(|(column, value)| {
                let text = value_text(value);
                (!text.trim().is_empty()).then(|| format!("{}: {}", column, text))
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// Metadata value for a cell; `None` for empty cells
fn metadata_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(value.clone()),
        Value::Array(_) | Value::Object(_) => Some(Value::String(value.to_string())),
    }
}

/// Turn table rows into records
///
/// `stamp` supplies the provenance metadata for a 0-based row index; column
/// values never overwrite stamped keys. Rows with blank content are skipped
/// and counted.
pub fn table_to_records(
    table: &Table,
    options: &TabularOptions,
    origin: &str,
    mut stamp: impl FnMut(usize) -> Metadata,
) -> Result<LoadedSource, LoadError> {
    if table.rows.is_empty() {
        return Err(LoadError::empty(origin));
    }

    let strategy = resolve_strategy(table, options, origin)?;
    tracing::debug!("[{}] content strategy: {:?}", origin, strategy);

    let mut loaded = LoadedSource::default();

    for (idx, row) in table.rows.iter().enumerate() {
        let content = row_content(table, row, strategy);
        let content = content.trim();
        if content.is_empty() {
            loaded.skipped += 1;
            if loaded.skipped <= LOGGED_SKIPS {
                tracing::warn!("[{}] Skipping row {}: empty content", origin, idx);
            }
            continue;
        }

        let mut metadata = stamp(idx);
        for (col_idx, (column, value)) in table.columns.iter().zip(row).enumerate() {
            let wanted = match &options.metadata_fields {
                Some(fields) => fields.contains(column),
                None => strategy != ContentStrategy::Column(col_idx),
            };
            if !wanted {
                continue;
            }
            if let Some(value) = metadata_value(value) {
                metadata.entry(column.clone()).or_insert(value);
            }
        }

        loaded.records.push(RawRecord {
            text: content.to_string(),
            metadata,
        });
    }

    if loaded.skipped > LOGGED_SKIPS {
        tracing::warn!("[{}] Skipped {} rows with empty content", origin, loaded.skipped);
    }

    if loaded.records.is_empty() {
        return Err(LoadError::empty(origin));
    }

    Ok(loaded)
}
