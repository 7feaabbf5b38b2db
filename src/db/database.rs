use crate::db::db_pool::DuckDBConnectionManager;
use duckdb::AccessMode;
use r2d2::{Pool, PooledConnection};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug)]
pub enum DatabaseError {
    Open(String),
    Pool(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::Open(msg) => write!(f, "Failed to open database: {}", msg),
            DatabaseError::Pool(msg) => write!(f, "Database pool error: {}", msg),
        }
    }
}

impl std::error::Error for DatabaseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    /// Only for stores where the read-only mode is unavailable; the sandbox
    /// still rolls every statement back.
    ReadWrite,
}

/// Handle to one file-based database, opened read-mostly behind a small pool.
#[derive(Clone)]
pub struct Database {
    path: PathBuf,
    access: Access,
    pool: Pool<DuckDBConnectionManager>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path)
            .field("access", &self.access)
            .finish()
    }
}

impl Database {
    /// Opens `path` read-only. `connection_wait` bounds how long a caller
    /// waits for a free pooled connection.
    pub fn open(
        path: impl AsRef<Path>,
        pool_size: usize,
        connection_wait: Duration,
    ) -> Result<Self, DatabaseError> {
        Self::open_with_access(path, pool_size, connection_wait, Access::ReadOnly)
    }

    pub fn open_with_access(
        path: impl AsRef<Path>,
        pool_size: usize,
        connection_wait: Duration,
        access: Access,
    ) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DatabaseError::Open(format!(
                "{} does not exist or is not a file",
                path.display()
            )));
        }

        let mode = match access {
            Access::ReadOnly => AccessMode::ReadOnly,
            Access::ReadWrite => AccessMode::ReadWrite,
        };
        let manager = DuckDBConnectionManager::open(path, mode)
            .map_err(|e| DatabaseError::Open(format!("{}: {}", path.display(), e)))?;

        let pool = Pool::builder()
            .max_size(pool_size.max(1) as u32)
            .connection_timeout(connection_wait)
            .build(manager)
            .map_err(|e| DatabaseError::Pool(e.to_string()))?;

        info!("Opened database {} ({:?})", path.display(), access);
        Ok(Self {
            path: path.to_path_buf(),
            access,
            pool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> Result<PooledConnection<DuckDBConnectionManager>, DatabaseError> {
        self.pool.get().map_err(|e| DatabaseError::Pool(e.to_string()))
    }
}
