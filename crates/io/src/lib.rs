// File I/O: record ingestion and workbook export

pub mod csv;
pub mod json;
pub mod xlsx;

use std::path::{Path, PathBuf};

use pricelens_core::Record;

/// Errors raised while reading records or writing a workbook.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported input format {0:?} (expected csv, tsv or json)")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Shape(String),

    #[error("XLSX export failed: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),
}

/// Input formats accepted at the ingestion boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Csv,
    Tsv,
    Json,
}

impl InputFormat {
    pub fn from_extension(path: &Path) -> Result<Self, IoError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        Self::parse(&ext)
    }

    pub fn parse(name: &str) -> Result<Self, IoError> {
        match name {
            "csv" => Ok(InputFormat::Csv),
            "tsv" | "tab" => Ok(InputFormat::Tsv),
            "json" => Ok(InputFormat::Json),
            other => Err(IoError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Load records from `path`, choosing the reader from `format` or the file
/// extension. An empty dataset is an error.
pub fn load_records(path: &Path, format: Option<InputFormat>) -> Result<Vec<Record>, IoError> {
    let format = match format {
        Some(f) => f,
        None => InputFormat::from_extension(path)?,
    };
    let records = match format {
        InputFormat::Csv => csv::import(path)?,
        InputFormat::Tsv => csv::import_with_delimiter(path, b'\t')?,
        InputFormat::Json => json::import(path)?,
    };
    if records.is_empty() {
        return Err(IoError::Shape(format!("{} contains no records", path.display())));
    }
    log::debug!("loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
