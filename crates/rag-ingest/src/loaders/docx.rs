//! DOCX loader

use docx_rs::{DocumentChild, ParagraphChild, RunChild};
use serde_json::Value;
use std::path::Path;

use super::LoadedSource;
use crate::error::LoadError;
use crate::types::RawRecord;

/// Load a DOCX file as a single record of paragraph text
pub fn load_docx(path: &Path) -> Result<LoadedSource, LoadError> {
    let origin = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| LoadError::unreadable(&origin, e.to_string()))?;
    parse_docx(&data, &origin)
}

/// Extract paragraph text from DOCX bytes
pub fn parse_docx(data: &[u8], origin: &str) -> Result<LoadedSource, LoadError> {
    let doc = docx_rs::read_docx(data).map_err(|e| LoadError::unreadable(origin, e.to_string()))?;

    let mut paragraphs = Vec::new();
    for child in doc.document.children {
        // Tables and section properties carry no running prose
        if let DocumentChild::Paragraph(p) = child {
            let mut line = String::new();
            for child in p.children {
                if let ParagraphChild::Run(run) = child {
                    for child in run.children {
                        match child {
                            RunChild::Text(t) => line.push_str(&t.text),
                            RunChild::Tab(_) => line.push('\t'),
                            RunChild::Break(_) => line.push('\n'),
                            _ => {}
                        }
                    }
                }
            }
            paragraphs.push(line);
        }
    }

    let text = paragraphs.join("\n");
    if text.trim().is_empty() {
        return Err(LoadError::empty(origin));
    }

    tracing::info!("[{}] DOCX loaded: {} characters", origin, text.chars().count());

    Ok(LoadedSource::single(
        RawRecord::new(text)
            .with_meta("source", Value::from(origin))
            .with_meta("document_type", "docx"),
    ))
}
