//! Remote dataset rows (Hugging Face datasets-server)

use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use super::tabular::{table_to_records, Table, TabularOptions};
use super::LoadedSource;
use crate::config::DatasetConfig;
use crate::error::{Error, LoadError, Result};
use crate::types::Metadata;

/// Which dataset rows to load and how to read them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRequest {
    /// Dataset name, e.g. `imdb` or `owner/name`
    pub dataset: String,
    /// Split (defaults to the configured split)
    #[serde(default)]
    pub split: Option<String>,
    /// Dataset configuration name
    #[serde(default)]
    pub config: Option<String>,
    /// Number of rows to fetch (defaults to the configured page length)
    #[serde(default)]
    pub limit: Option<usize>,
    /// Content selection
    #[serde(default, flatten)]
    pub tabular: TabularOptions,
}

impl DatasetRequest {
    /// Request the default split of a dataset
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            split: None,
            config: None,
            limit: None,
            tabular: TabularOptions::default(),
        }
    }

    /// Provenance string stamped on every row
    pub fn origin(&self) -> String {
        format!("dataset://{}", self.dataset)
    }
}

/// Column list and sample rows of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetPreview {
    pub columns: Vec<String>,
    pub sample_rows: Vec<serde_json::Map<String, Value>>,
    pub total_rows: usize,
}

/// Outcome of checking a request against the live dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetValidation {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_columns: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RowsPage {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    rows: Vec<RowItem>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RowItem {
    row: serde_json::Map<String, Value>,
}

impl RowsPage {
    fn into_table(self) -> Table {
        let objects: Vec<_> = self.rows.into_iter().map(|item| item.row).collect();
        if self.features.is_empty() {
            return Table::from_objects(&objects);
        }

        let columns: Vec<String> = self.features.into_iter().map(|f| f.name).collect();
        let rows = objects
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect();
        Table { columns, rows }
    }
}

/// Fetches dataset rows over HTTP
pub struct DatasetLoader {
    client: reqwest::Client,
    base_url: String,
    default_split: String,
    page_length: usize,
}

impl DatasetLoader {
    /// Create a loader from configuration
    pub fn new(config: &DatasetConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build dataset HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_split: config.default_split.clone(),
            page_length: config.page_length,
        })
    }

    fn split<'a>(&'a self, request: &'a DatasetRequest) -> &'a str {
        request.split.as_deref().unwrap_or(&self.default_split)
    }

    /// Configuration names to try, in order
    fn access_variants(request: &DatasetRequest) -> Vec<Option<String>> {
        match &request.config {
            Some(config) => vec![Some(config.clone()), None],
            None => vec![None, Some("default".to_string())],
        }
    }

    fn rows_url(&self, request: &DatasetRequest, config: Option<&str>, length: usize) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/rows", self.base_url))
            .map_err(|e| Error::Config(format!("Invalid dataset base URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dataset", &request.dataset);
            if let Some(config) = config {
                query.append_pair("config", config);
            }
            query.append_pair("split", self.split(request));
            query.append_pair("offset", "0");
            query.append_pair("length", &length.to_string());
        }
        Ok(url)
    }

    async fn fetch(&self, url: Url) -> std::result::Result<RowsPage, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("{}: {}", status, body));
        }

        response.json::<RowsPage>().await.map_err(|e| e.to_string())
    }

    /// Try each access variant until one answers
    async fn fetch_first(
        &self,
        request: &DatasetRequest,
        length: usize,
    ) -> std::result::Result<(RowsPage, Option<String>), LoadError> {
        let mut last_error = String::from("no access variant attempted");

        for config in Self::access_variants(request) {
            let url = self
                .rows_url(request, config.as_deref(), length)
                .map_err(|e| LoadError::unreadable(request.origin(), e.to_string()))?;
            tracing::debug!("[{}] Trying {}", request.origin(), url);

            match self.fetch(url).await {
                Ok(page) => return Ok((page, config)),
                Err(e) => {
                    tracing::warn!(
                        "[{}] Variant config={:?} failed: {}",
                        request.origin(),
                        config,
                        e
                    );
                    last_error = e;
                }
            }
        }

        Err(LoadError::Remote {
            dataset: request.dataset.clone(),
            split: self.split(request).to_string(),
            column: request
                .tabular
                .content_field
                .clone()
                .unwrap_or_else(|| "(auto)".to_string()),
            message: last_error,
        })
    }

    /// Load rows as records
    pub async fn load(&self, request: &DatasetRequest) -> std::result::Result<LoadedSource, LoadError> {
        let origin = request.origin();
        let length = request.limit.unwrap_or(self.page_length);
        let (page, used_config) = self.fetch_first(request, length).await?;
        let table = page.into_table();
        let split = self.split(request).to_string();

        tracing::info!(
            "[{}] Fetched {} rows (split {}, config {:?})",
            origin,
            table.rows.len(),
            split,
            used_config
        );

        let loaded = table_to_records(&table, &request.tabular, &origin, |idx| {
            let mut metadata = Metadata::new();
            metadata.insert("source".into(), Value::from(origin.as_str()));
            metadata.insert("row_index".into(), Value::from(idx));
            metadata.insert("dataset_name".into(), Value::from(request.dataset.as_str()));
            metadata.insert("split".into(), Value::from(split.as_str()));
            if let Some(config) = &used_config {
                metadata.insert("dataset_config".into(), Value::from(config.as_str()));
            }
            metadata
        })?;

        if loaded.skipped > 0 {
            tracing::info!(
                "[{}] Created {} records (filtered out {} empty rows)",
                origin,
                loaded.records.len(),
                loaded.skipped
            );
        }

        Ok(loaded)
    }

    /// Fetch a few rows to show the dataset's shape
    pub async fn preview(
        &self,
        request: &DatasetRequest,
        limit: usize,
    ) -> std::result::Result<DatasetPreview, LoadError> {
        let (page, _) = self.fetch_first(request, limit.max(1)).await?;
        let table = page.into_table();
        if table.rows.is_empty() {
            return Err(LoadError::empty(request.origin()));
        }

        let sample_rows = table
            .rows
            .iter()
            .map(|row| table.columns.iter().cloned().zip(row.iter().cloned()).collect())
            .collect::<Vec<_>>();

        Ok(DatasetPreview {
            total_rows: sample_rows.len(),
            columns: table.columns,
            sample_rows,
        })
    }

    /// Check that declared content and metadata fields exist
    pub async fn validate(&self, request: &DatasetRequest) -> DatasetValidation {
        let preview = match self.preview(request, 1).await {
            Ok(preview) => preview,
            Err(e) => {
                return DatasetValidation {
                    valid: false,
                    errors: vec![e.to_string()],
                    warnings: Vec::new(),
                    available_columns: None,
                }
            }
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(field) = &request.tabular.content_field {
            if !preview.columns.contains(field) {
                errors.push(format!(
                    "Content column '{}' not found. Available: {}",
                    field,
                    preview.columns.join(", ")
                ));
            }
        }

        if let Some(fields) = &request.tabular.metadata_fields {
            let missing: Vec<&str> = fields
                .iter()
                .filter(|f| !preview.columns.contains(f))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                warnings.push(format!("Metadata columns not found: {}", missing.join(", ")));
            }
        }

        DatasetValidation {
            valid: errors.is_empty(),
            errors,
            warnings,
            available_columns: Some(preview.columns),
        }
    }
}
