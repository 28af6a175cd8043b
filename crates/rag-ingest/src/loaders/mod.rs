//! Source loaders: every supported input becomes a sequence of [`RawRecord`]s

pub mod csv_file;
pub mod dataset;
pub mod docx;
pub mod pdf;
pub mod tabular;
pub mod text;

pub use csv_file::CsvOptions;
pub use dataset::{DatasetLoader, DatasetPreview, DatasetRequest, DatasetValidation};
pub use tabular::{Table, TabularOptions};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::config::DatasetConfig;
use crate::error::{LoadError, Result};
use crate::ingestion::splitter::SourceType;
use crate::types::{Metadata, RawRecord};

/// MIME type of DOCX files
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Records produced by one load call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadedSource {
    pub records: Vec<RawRecord>,
    /// Rows, pages or records dropped for having no text
    pub skipped: usize,
}

impl LoadedSource {
    /// Wrap a single record
    pub fn single(record: RawRecord) -> Self {
        Self {
            records: vec![record],
            skipped: 0,
        }
    }
}

/// Tabular rows already held in memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    /// Provenance stamped on every row
    pub name: String,
    pub table: Table,
    #[serde(default)]
    pub options: TabularOptions,
}

impl RowSet {
    /// Build a row set from JSON objects
    pub fn from_objects(
        name: impl Into<String>,
        objects: &[serde_json::Map<String, Value>],
        options: TabularOptions,
    ) -> Self {
        Self {
            name: name.into(),
            table: Table::from_objects(objects),
            options,
        }
    }
}

/// A supported input, one variant per source kind
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Pdf { path: PathBuf },
    Docx { path: PathBuf },
    Text { path: PathBuf },
    Csv { path: PathBuf, options: CsvOptions },
    Dataset(DatasetRequest),
    Rows(RowSet),
    /// Records produced elsewhere; blank ones are still dropped
    Records(Vec<RawRecord>),
}

impl Source {
    /// Map a declared MIME type to a file source
    pub fn from_mime(path: impl Into<PathBuf>, mime: &str) -> std::result::Result<Self, LoadError> {
        let path = path.into();
        let essence = mime.split(';').next().unwrap_or_default().trim().to_lowercase();
        match essence.as_str() {
            "application/pdf" => Ok(Self::Pdf { path }),
            DOCX_MIME => Ok(Self::Docx { path }),
            "text/plain" => Ok(Self::Text { path }),
            "text/csv" | "application/csv" | "application/vnd.ms-excel" => Ok(Self::Csv {
                path,
                options: CsvOptions::default(),
            }),
            _ => Err(LoadError::UnsupportedType(mime.to_string())),
        }
    }

    /// Infer the source kind from a file extension
    pub fn from_path(path: impl Into<PathBuf>) -> std::result::Result<Self, LoadError> {
        let path = path.into();
        let mime = mime_guess::from_path(&path)
            .first_raw()
            .ok_or_else(|| LoadError::UnsupportedType(path.display().to_string()))?;
        Self::from_mime(path, mime)
    }

    /// Chunking policy class of this source
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Pdf { .. } => SourceType::Paginated,
            Self::Docx { .. } => SourceType::Narrative,
            Self::Text { .. } => SourceType::PlainText,
            Self::Csv { .. } | Self::Dataset(_) | Self::Rows(_) | Self::Records(_) => {
                SourceType::Default
            }
        }
    }

    /// Provenance string for logs and fallbacks
    pub fn origin(&self) -> String {
        match self {
            Self::Pdf { path } | Self::Docx { path } | Self::Text { path } | Self::Csv { path, .. } => {
                path.display().to_string()
            }
            Self::Dataset(request) => request.origin(),
            Self::Rows(rows) => rows.name.clone(),
            Self::Records(_) => "records".to_string(),
        }
    }

    /// Display name used as the original filename
    pub fn display_name(&self) -> String {
        match self {
            Self::Pdf { path } | Self::Docx { path } | Self::Text { path } | Self::Csv { path, .. } => {
                file_name(path)
            }
            Self::Dataset(request) => request.dataset.clone(),
            Self::Rows(rows) => rows.name.clone(),
            Self::Records(_) => "records".to_string(),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Dispatches a [`Source`] to its loader
pub struct SourceLoader {
    datasets: DatasetLoader,
}

impl SourceLoader {
    /// Create a loader from dataset configuration
    pub fn new(config: &DatasetConfig) -> Result<Self> {
        Ok(Self {
            datasets: DatasetLoader::new(config)?,
        })
    }

    /// Remote dataset loader
    pub fn datasets(&self) -> &DatasetLoader {
        &self.datasets
    }

    /// Load a source into records
    pub async fn load(&self, source: &Source) -> std::result::Result<LoadedSource, LoadError> {
        let origin = source.origin();
        tracing::info!("[{}] Loading source", origin);

        let loaded = match source {
            Source::Pdf { path } => blocking(path, origin.clone(), pdf::load_pdf).await?,
            Source::Docx { path } => blocking(path, origin.clone(), docx::load_docx).await?,
            Source::Text { path } => blocking(path, origin.clone(), text::load_text).await?,
            Source::Csv { path, options } => {
                let options = options.clone();
                blocking(path, origin.clone(), move |p| csv_file::load_csv(p, &options)).await?
            }
            Source::Dataset(request) => self.datasets.load(request).await?,
            Source::Rows(rows) => load_rows(rows)?,
            Source::Records(records) => load_records(records, &origin)?,
        };

        tracing::info!(
            "[{}] Loaded {} records ({} skipped)",
            origin,
            loaded.records.len(),
            loaded.skipped
        );
        Ok(loaded)
    }
}

/// Run a file loader off the async runtime
async fn blocking<F>(
    path: &Path,
    origin: String,
    load: F,
) -> std::result::Result<LoadedSource, LoadError>
where
    F: FnOnce(&Path) -> std::result::Result<LoadedSource, LoadError> + Send + 'static,
{
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || load(&path))
        .await
        .map_err(|e| LoadError::unreadable(origin, format!("Task join error: {}", e)))?
}

fn load_rows(rows: &RowSet) -> std::result::Result<LoadedSource, LoadError> {
    tabular::table_to_records(&rows.table, &rows.options, &rows.name, |idx| {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), Value::from(rows.name.as_str()));
        metadata.insert("row_index".into(), Value::from(idx));
        metadata
    })
}

fn load_records(records: &[RawRecord], origin: &str) -> std::result::Result<LoadedSource, LoadError> {
    let mut loaded = LoadedSource::default();
    for record in records {
        if record.text.trim().is_empty() {
            loaded.skipped += 1;
        } else {
            loaded.records.push(record.clone());
        }
    }
    if loaded.records.is_empty() {
        return Err(LoadError::empty(origin));
    }
    Ok(loaded)
}
