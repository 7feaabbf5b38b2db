// Builds database files from flat files so they can be selected as a session database.
pub mod csv;

use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub enum IngestError {
    IoError(std::io::Error),
    DatabaseError(String),
    UnsupportedFileType(String),
    InvalidTableName(String),
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::IoError(err) => write!(f, "IO error: {}", err),
            IngestError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            IngestError::UnsupportedFileType(ext) => write!(f, "Unsupported file type: {}", ext),
            IngestError::InvalidTableName(name) => write!(f, "Invalid table name: {}", name),
        }
    }
}

impl std::error::Error for IngestError {}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::IoError(err)
    }
}

impl From<duckdb::Error> for IngestError {
    fn from(err: duckdb::Error) -> Self {
        IngestError::DatabaseError(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedTable {
    pub table: String,
    pub rows: u64,
}

/// Loads each file into `db_path`, one table per file named after the file stem.
pub fn ingest_files(db_path: &Path, files: &[impl AsRef<Path>]) -> Result<Vec<IngestedTable>, IngestError> {
    let conn = duckdb::Connection::open(db_path)?;
    let mut ingested = Vec::with_capacity(files.len());

    for file in files {
        let path = file.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| IngestError::UnsupportedFileType("No extension".to_string()))?;

        let table = table_name_for(path)?;
        let rows = match extension.to_lowercase().as_str() {
            "csv" | "tsv" => csv::load_csv(&conn, path, &table)?,
            other => return Err(IngestError::UnsupportedFileType(other.to_string())),
        };
        tracing::info!("Loaded {} rows from {} into {}", rows, path.display(), table);
        ingested.push(IngestedTable { table, rows });
    }

    Ok(ingested)
}

/// Lowercased file stem with anything outside `[a-z0-9_]` replaced by `_`.
pub fn table_name_for(path: &Path) -> Result<String, IngestError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let name: String = stem
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '_') {
        return Err(IngestError::InvalidTableName(stem.to_string()));
    }
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(format!("t_{}", name));
    }
    Ok(name)
}
