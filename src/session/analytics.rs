use crate::db::result::QueryStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Upper bound of the query log; on overflow it keeps the most recent half.
pub const QUERY_LOG_LIMIT: usize = 100;
const QUERY_LOG_KEEP: usize = 50;

/// Raw counters. Rates and averages are derived on read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Analytics {
    pub total_queries: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub cumulative_latency_ms: u64,
    pub cache_hits: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub total_queries: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub cache_hits: u64,
    /// Percentage in 0..=100.
    pub success_rate: f64,
    pub average_latency_ms: f64,
}

impl Analytics {
    /// Anything that is not an error counts as a success.
    pub fn record_outcome(&mut self, status: QueryStatus, elapsed_ms: u64) {
        self.total_queries += 1;
        if status == QueryStatus::Error {
            self.error_count += 1;
        } else {
            self.success_count += 1;
        }
        self.cumulative_latency_ms += elapsed_ms;
    }

    pub fn record_cache_hit(&mut self) {
        self.cache_hits += 1;
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_queries as f64 * 100.0
        }
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.cumulative_latency_ms as f64 / self.total_queries as f64
        }
    }

    pub fn snapshot(&self) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            total_queries: self.total_queries,
            success_count: self.success_count,
            error_count: self.error_count,
            cache_hits: self.cache_hits,
            success_rate: self.success_rate(),
            average_latency_ms: self.average_latency_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryLogEntry {
    pub question: String,
    pub answer: String,
    pub sql: Option<String>,
    pub status: QueryStatus,
    pub elapsed_ms: u64,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct QueryLog {
    entries: Vec<QueryLogEntry>,
}

impl QueryLog {
    pub fn push(&mut self, entry: QueryLogEntry) {
        self.entries.push(entry);
        if self.entries.len() > QUERY_LOG_LIMIT {
            let drop = self.entries.len() - QUERY_LOG_KEEP;
            self.entries.drain(..drop);
        }
    }

    pub fn entries(&self) -> &[QueryLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
