use crate::db::database::Database;
use crate::db::result::{QueryErrorKind, QueryResult};
use crate::db::rows::{collect_rows, CollectedRows};
use duckdb::Connection;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum SandboxError {
    Connection(String),
    Syntax(String),
    Runtime(String),
    Timeout(Duration),
}

impl SandboxError {
    pub fn kind(&self) -> QueryErrorKind {
        match self {
            SandboxError::Connection(_) => QueryErrorKind::Connection,
            SandboxError::Syntax(_) => QueryErrorKind::Syntax,
            SandboxError::Runtime(_) => QueryErrorKind::ConstraintOrRuntime,
            SandboxError::Timeout(_) => QueryErrorKind::Timeout,
        }
    }

    /// Sorts a DuckDB error message into the sandbox taxonomy.
    pub fn classify(message: String) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("parser error") || lower.contains("syntax error") {
            SandboxError::Syntax(message)
        } else if lower.contains("io error")
            || lower.contains("connection")
            || lower.contains("could not set lock")
        {
            SandboxError::Connection(message)
        } else {
            SandboxError::Runtime(message)
        }
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::Connection(msg) => write!(f, "Connection error: {}", msg),
            SandboxError::Syntax(msg) => write!(f, "Syntax error: {}", msg),
            SandboxError::Runtime(msg) => write!(f, "Query failed: {}", msg),
            SandboxError::Timeout(limit) => {
                write!(f, "Query exceeded the {}s time limit", limit.as_secs_f32())
            }
        }
    }
}

impl std::error::Error for SandboxError {}

/// Executes validated SQL with a wall-clock limit and a row cap.
///
/// Every statement runs inside a transaction that is always rolled back, on
/// top of the read-only access mode the database handle is opened with.
#[derive(Debug, Clone)]
pub struct Sandbox {
    timeout: Duration,
    row_cap: usize,
}

impl Sandbox {
    pub fn new(timeout: Duration, row_cap: usize) -> Self {
        Self {
            timeout,
            row_cap: row_cap.max(1),
        }
    }

    pub async fn execute(&self, db: &Database, sql: &str) -> QueryResult {
        let start = Instant::now();
        let db = db.clone();
        let sql_owned = sql.to_string();
        let row_cap = self.row_cap;

        debug!("Sandbox executing: {}", sql);
        let outcome = run_with_timeout(self.timeout, move || {
            let conn = db
                .connection()
                .map_err(|e| SandboxError::Connection(e.to_string()))?;
            run_rolled_back(&conn, &sql_owned, row_cap)
        })
        .await;

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(collected) => {
                info!(
                    "Query returned {} rows in {}ms{}",
                    collected.rows.len(),
                    elapsed_ms,
                    if collected.truncated { " (truncated)" } else { "" }
                );
                QueryResult::from_rows(collected.columns, collected.rows, collected.truncated, elapsed_ms)
            }
            Err(err) => {
                warn!("Query failed after {}ms: {}", elapsed_ms, err);
                QueryResult::error(err.kind(), err.to_string(), elapsed_ms)
            }
        }
    }
}

fn run_rolled_back(conn: &Connection, sql: &str, row_cap: usize) -> Result<CollectedRows, SandboxError> {
    conn.execute_batch("BEGIN TRANSACTION")
        .map_err(|e| SandboxError::Connection(e.to_string()))?;

    let result = conn
        .prepare(sql)
        .map_err(|e| SandboxError::classify(e.to_string()))
        .and_then(|mut stmt| {
            collect_rows(&mut stmt, row_cap).map_err(|e| SandboxError::classify(e.to_string()))
        });

    if let Err(e) = conn.execute_batch("ROLLBACK") {
        warn!("Rollback after sandboxed query failed: {}", e);
    }
    result
}

/// Runs blocking work on the blocking pool and gives up waiting after `timeout`.
/// Abandoned work finishes in the background; its result is dropped.
pub(crate) async fn run_with_timeout<T, F>(timeout: Duration, work: F) -> Result<T, SandboxError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SandboxError> + Send + 'static,
{
    let handle = tokio::task::spawn_blocking(work);
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(SandboxError::Connection(format!(
            "Database task execution failed: {}",
            join_err
        ))),
        Err(_) => Err(SandboxError::Timeout(timeout)),
    }
}
