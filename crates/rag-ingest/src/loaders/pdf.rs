//! PDF loader: one record per page

use serde_json::Value;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::LoadedSource;
use crate::error::LoadError;
use crate::types::RawRecord;

/// Whole-document extraction is abandoned after this long
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(60);

/// Typographic characters PDF fonts commonly emit, with plain replacements
const GLYPH_REPLACEMENTS: &[(char, &str)] = &[
    ('\u{2010}', "-"),
    ('\u{2011}', "-"),
    ('\u{2012}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2022}', "* "),
    ('\u{2026}', "..."),
    ('\u{00A0}', " "),
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
    ('\0', ""),
];

/// Replace ligatures, smart punctuation and NULs
pub fn normalize_glyphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match GLYPH_REPLACEMENTS.iter().find(|(from, _)| *from == c) {
            Some((_, to)) => out.push_str(to),
            None => out.push(c),
        }
    }
    out
}

/// Load a PDF from disk
pub fn load_pdf(path: &Path) -> Result<LoadedSource, LoadError> {
    let origin = path.display().to_string();
    let data = std::fs::read(path).map_err(|e| LoadError::unreadable(&origin, e.to_string()))?;
    parse_pdf(&data, &origin)
}

/// Extract text page by page, stamping `page_number` and `total_pages`
///
/// Pages without text are skipped and counted. When no page yields text the
/// whole document goes through a second extractor and becomes one record.
pub fn parse_pdf(data: &[u8], origin: &str) -> Result<LoadedSource, LoadError> {
    let pages = match extract_pages(data) {
        Ok(pages) => pages,
        Err(e) => {
            tracing::warn!("[{}] Page extraction failed: {}, trying fallback", origin, e);
            Vec::new()
        }
    };

    let total_pages = pages.len();
    let mut loaded = LoadedSource::default();

    for (page_number, text) in pages {
        let text = normalize_glyphs(&text);
        if text.trim().is_empty() {
            tracing::debug!("[{}] Page {} has no extractable text", origin, page_number);
            loaded.skipped += 1;
            continue;
        }
        loaded.records.push(
            RawRecord::new(text)
                .with_meta("source", Value::from(origin))
                .with_meta("page_number", page_number)
                .with_meta("total_pages", total_pages),
        );
    }

    if loaded.records.is_empty() {
        let text = normalize_glyphs(&extract_whole_with_timeout(data, origin)?);
        if text.trim().is_empty() {
            return Err(LoadError::unreadable(
                origin,
                "PDF appears to be image-based or has no extractable text",
            ));
        }
        loaded.records.push(
            RawRecord::new(text)
                .with_meta("source", Value::from(origin))
                .with_meta("page_number", 1)
                .with_meta("total_pages", total_pages.max(1)),
        );
    }

    tracing::info!(
        "[{}] PDF loaded: {} pages, {} with text",
        origin,
        total_pages,
        loaded.records.len()
    );

    Ok(loaded)
}

fn extract_pages(data: &[u8]) -> Result<Vec<(u32, String)>, lopdf::Error> {
    let doc = lopdf::Document::load_mem(data)?;
    let pages = doc.get_pages();

    Ok(pages
        .keys()
        .map(|&number| {
            let text = doc.extract_text(&[number]).unwrap_or_default();
            (number, text)
        })
        .collect())
}

/// Run pdf-extract on a worker thread so a pathological font cannot hang the caller
fn extract_whole_with_timeout(data: &[u8], origin: &str) -> Result<String, LoadError> {
    let data = data.to_vec();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
    });

    match rx.recv_timeout(FALLBACK_TIMEOUT) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(LoadError::unreadable(origin, e.to_string())),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::error!("[{}] PDF extraction timed out after {:?}", origin, FALLBACK_TIMEOUT);
            Err(LoadError::unreadable(origin, "PDF extraction timed out"))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            Err(LoadError::unreadable(origin, "PDF extraction thread crashed"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// Minimal multi-page PDF with one line of Helvetica text per page
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![72.into(), 720.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_normalize_glyphs() {
        assert_eq!(normalize_glyphs("\u{FB01}ne \u{201C}quote\u{201D}\u{2026}"), "fine \"quote\"...");
    }

    #[test]
    fn test_pages_stamped() {
        let data = build_pdf(&["Alpha page", "Beta page", "Gamma page"]);
        let loaded = parse_pdf(&data, "report.pdf").unwrap();

        assert_eq!(loaded.records.len(), 3);
        for (i, record) in loaded.records.iter().enumerate() {
            assert_eq!(record.metadata["page_number"], (i + 1) as u64);
            assert_eq!(record.metadata["total_pages"], 3);
            assert_eq!(record.source(), Some("report.pdf"));
        }
        assert!(loaded.records[1].text.contains("Beta"));
    }

    #[test]
    fn test_garbage_is_unreadable() {
        let err = parse_pdf(b"%PDF-garbage", "bad.pdf").unwrap_err();
        assert!(matches!(err, LoadError::Unreadable { .. }));
    }
}
