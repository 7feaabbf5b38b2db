use crate::chart::ChartSpec;
use crate::db::schema::{DataType, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Ok,
    Empty,
    Error,
}

/// User-visible failure classes of one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorKind {
    Introspection,
    UnsafeQuery,
    Syntax,
    Timeout,
    ConstraintOrRuntime,
    Connection,
    Provider,
}

impl QueryErrorKind {
    /// Whether the repair loop may feed this error back to the model.
    pub fn is_repairable(self) -> bool {
        matches!(self, QueryErrorKind::Syntax | QueryErrorKind::ConstraintOrRuntime)
    }
}

impl fmt::Display for QueryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueryErrorKind::Introspection => "IntrospectionError",
            QueryErrorKind::UnsafeQuery => "UnsafeQueryError",
            QueryErrorKind::Syntax => "SyntaxError",
            QueryErrorKind::Timeout => "TimeoutError",
            QueryErrorKind::ConstraintOrRuntime => "ConstraintOrRuntimeError",
            QueryErrorKind::Connection => "ConnectionError",
            QueryErrorKind::Provider => "ProviderError",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub status: QueryStatus,
    pub columns: Vec<ResultColumn>,
    pub rows: Vec<Row>,
    /// Set when more rows existed than the display cap allowed.
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<QueryErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_spec: Option<ChartSpec>,
}

impl QueryResult {
    pub fn from_rows(columns: Vec<ResultColumn>, rows: Vec<Row>, truncated: bool, elapsed_ms: u64) -> Self {
        let status = if rows.is_empty() {
            QueryStatus::Empty
        } else {
            QueryStatus::Ok
        };
        Self {
            status,
            columns,
            rows,
            truncated,
            error_kind: None,
            error_detail: None,
            elapsed_ms,
            chart_spec: None,
        }
    }

    pub fn error(kind: QueryErrorKind, detail: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            status: QueryStatus::Error,
            columns: Vec::new(),
            rows: Vec::new(),
            truncated: false,
            error_kind: Some(kind),
            error_detail: Some(detail.into()),
            elapsed_ms,
            chart_spec: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Compares everything except latency.
    pub fn same_outcome(&self, other: &QueryResult) -> bool {
        self.status == other.status
            && self.columns == other.columns
            && self.rows == other.rows
            && self.truncated == other.truncated
            && self.error_kind == other.error_kind
            && self.error_detail == other.error_detail
    }
}
