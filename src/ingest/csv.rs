use crate::db::introspect::quote_ident;
use crate::ingest::IngestError;
use duckdb::Connection;
use std::path::Path;

/// Replaces `table` with the contents of a CSV file, using DuckDB's type inference.
pub fn load_csv(conn: &Connection, path: &Path, table: &str) -> Result<u64, IngestError> {
    if !path.is_file() {
        return Err(IngestError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} not found", path.display()),
        )));
    }

    let source = path.to_string_lossy().replace('\'', "''");
    conn.execute_batch(&format!(
        "CREATE OR REPLACE TABLE {} AS SELECT * FROM read_csv_auto('{}', header = true, sample_size = -1)",
        quote_ident(table),
        source
    ))
    .map_err(|e| IngestError::DatabaseError(format!("Failed to load {}: {}", path.display(), e)))?;

    // Verify the table was properly created
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |row| row.get(0),
    )?;
    Ok(count.max(0) as u64)
}
