//! Plain-text loader

use serde_json::Value;
use std::path::Path;

use super::LoadedSource;
use crate::error::LoadError;
use crate::types::RawRecord;

/// Load a UTF-8 text file as a single record
pub fn load_text(path: &Path) -> Result<LoadedSource, LoadError> {
    let origin = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| LoadError::unreadable(&origin, e.to_string()))?;
    parse_text(&data, &origin)
}

/// Decode text bytes, replacing invalid UTF-8 sequences
pub fn parse_text(data: &[u8], origin: &str) -> Result<LoadedSource, LoadError> {
    let text = String::from_utf8_lossy(data).replace('\0', "");
    if text.trim().is_empty() {
        return Err(LoadError::empty(origin));
    }

    tracing::info!("[{}] Text file loaded: {} characters", origin, text.chars().count());

    Ok(LoadedSource::single(
        RawRecord::new(text)
            .with_meta("source", Value::from(origin))
            .with_meta("document_type", "text"),
    ))
}
