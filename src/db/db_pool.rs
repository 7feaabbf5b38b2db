use duckdb::{AccessMode, Config, Connection};
use r2d2::ManageConnection;
use std::path::Path;
use std::sync::Mutex;

/// Hands out connections that all share one opened database instance.
///
/// DuckDB keeps one instance per opened file; further connections are
/// cloned from it so every pooled connection sees the same access mode.
pub struct DuckDBConnectionManager {
    base: Mutex<Connection>,
}

impl DuckDBConnectionManager {
    pub fn open(path: &Path, access: AccessMode) -> Result<Self, duckdb::Error> {
        let config = Config::default().access_mode(access)?;
        let base = Connection::open_with_flags(path, config)?;
        Ok(Self {
            base: Mutex::new(base),
        })
    }
}

impl ManageConnection for DuckDBConnectionManager {
    type Connection = Connection;
    type Error = duckdb::Error;

    fn connect(&self) -> Result<Self::Connection, Self::Error> {
        let base = self.base.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        base.try_clone()
    }

    fn is_valid(&self, conn: &mut Self::Connection) -> Result<(), Self::Error> {
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}
