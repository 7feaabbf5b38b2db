use crate::db::database::Database;
use crate::db::rows::collect_rows;
use crate::db::schema::{ColumnInfo, SchemaDescription, TableInfo};
use duckdb::Connection;
use std::fmt;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum IntrospectionError {
    Unreadable(String),
    Catalog(String),
    Task(String),
}

impl fmt::Display for IntrospectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntrospectionError::Unreadable(msg) => write!(f, "Database is unreadable: {}", msg),
            IntrospectionError::Catalog(msg) => write!(f, "Failed to read schema catalog: {}", msg),
            IntrospectionError::Task(msg) => write!(f, "Introspection task failed: {}", msg),
        }
    }
}

impl std::error::Error for IntrospectionError {}

/// Builds a [`SchemaDescription`] from a live database using read-only catalog queries.
#[derive(Debug, Clone)]
pub struct Introspector {
    sample_rows: usize,
    row_count_cap: u64,
}

impl Introspector {
    pub fn new(sample_rows: usize, row_count_cap: u64) -> Self {
        Self {
            sample_rows,
            row_count_cap,
        }
    }

    pub async fn introspect(&self, db: &Database) -> Result<SchemaDescription, IntrospectionError> {
        let db = db.clone();
        let this = self.clone();

        // DuckDB calls block, keep them off the async workers
        tokio::task::spawn_blocking(move || {
            let conn = db
                .connection()
                .map_err(|e| IntrospectionError::Unreadable(e.to_string()))?;
            let schema = this.describe(&conn)?;
            info!(
                "Introspected {}: {} tables, fingerprint {}",
                db.path().display(),
                schema.tables.len(),
                &schema.fingerprint[..12]
            );
            Ok(schema)
        })
        .await
        .map_err(|e| IntrospectionError::Task(e.to_string()))?
    }

    pub fn describe(&self, conn: &Connection) -> Result<SchemaDescription, IntrospectionError> {
        let table_names = list_tables(conn)?;
        debug!("Found {} user tables: {:?}", table_names.len(), table_names);

        let mut tables = Vec::with_capacity(table_names.len());
        for name in table_names {
            let columns = list_columns(conn, &name)?;
            let (row_count, row_count_capped) = self.count_rows(conn, &name);
            let sample_rows = self.sample(conn, &name);
            tables.push(TableInfo {
                name,
                columns,
                row_count,
                row_count_capped,
                sample_rows,
            });
        }

        Ok(SchemaDescription::new(tables))
    }

    fn count_rows(&self, conn: &Connection, table: &str) -> (u64, bool) {
        let sql = format!(
            "SELECT COUNT(*) FROM (SELECT 1 FROM {} LIMIT {})",
            quote_ident(table),
            self.row_count_cap
        );
        match conn.query_row(&sql, [], |row| row.get::<_, i64>(0)) {
            Ok(count) => {
                let count = count.max(0) as u64;
                (count, count >= self.row_count_cap)
            }
            Err(e) => {
                warn!("Could not count rows in {}: {}", table, e);
                (0, false)
            }
        }
    }

    fn sample(&self, conn: &Connection, table: &str) -> Vec<crate::db::schema::Row> {
        if self.sample_rows == 0 {
            return Vec::new();
        }
        let sql = format!("SELECT * FROM {} LIMIT {}", quote_ident(table), self.sample_rows);
        let collected = conn
            .prepare(&sql)
            .map_err(|e| e.to_string())
            .and_then(|mut stmt| collect_rows(&mut stmt, self.sample_rows).map_err(|e| e.to_string()));
        match collected {
            Ok(collected) => collected.rows,
            Err(e) => {
                warn!("Could not sample rows from {}: {}", table, e);
                Vec::new()
            }
        }
    }
}

fn list_tables(conn: &Connection) -> Result<Vec<String>, IntrospectionError> {
    let query = "SELECT table_name FROM information_schema.tables \
                 WHERE table_catalog = current_database() \
                   AND table_schema = 'main' \
                   AND table_type = 'BASE TABLE' \
                   AND table_name NOT LIKE 'sqlite_%' \
                   AND table_name NOT LIKE 'duck_%' \
                   AND table_name NOT LIKE 'pg_%' \
                 ORDER BY table_name";

    let mut stmt = conn
        .prepare(query)
        .map_err(|e| IntrospectionError::Unreadable(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| IntrospectionError::Catalog(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| IntrospectionError::Catalog(e.to_string()))
}

fn list_columns(conn: &Connection, table: &str) -> Result<Vec<ColumnInfo>, IntrospectionError> {
    let query = "SELECT column_name, data_type, is_nullable \
                 FROM information_schema.columns \
                 WHERE table_catalog = current_database() AND table_schema = 'main' AND table_name = ? \
                 ORDER BY ordinal_position";

    let mut stmt = conn
        .prepare(query)
        .map_err(|e| IntrospectionError::Catalog(e.to_string()))?;
    let rows = stmt
        .query_map([table], |row| {
            Ok(ColumnInfo::new(
                row.get::<_, String>(0)?,
                &row.get::<_, String>(1)?,
                row.get::<_, String>(2)? == "YES",
            ))
        })
        .map_err(|e| IntrospectionError::Catalog(e.to_string()))?;

    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| IntrospectionError::Catalog(e.to_string()))
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
