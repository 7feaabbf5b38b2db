pub mod analytics;
pub mod export;
pub mod history;

use crate::cache::ResultCache;
use crate::db::result::{QueryResult, QueryStatus};
use crate::db::schema::SchemaDescription;
use crate::db::Database;
use analytics::{Analytics, QueryLog, QueryLogEntry};
use chrono::{DateTime, Utc};
use history::{ChatHistory, ChatTurn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Everything one conversation owns. Dropped with the session.
#[derive(Debug)]
pub struct SessionState {
    id: String,
    created_at: DateTime<Utc>,
    history: ChatHistory,
    database: Option<Database>,
    schema: Option<SchemaDescription>,
    cache: ResultCache,
    analytics: Analytics,
    query_log: QueryLog,
    last_result: Option<QueryResult>,
    /// Bumped on every database change; in-flight work started under an
    /// older generation must not be committed.
    generation: u64,
}

/// What an in-flight question works from, copied out of the session so no
/// lock is held while the model and the database are busy.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub database: Database,
    pub schema: SchemaDescription,
    pub history: Vec<ChatTurn>,
    pub generation: u64,
}

impl SessionState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            history: ChatHistory::new(),
            database: None,
            schema: None,
            cache: ResultCache::new(),
            analytics: Analytics::default(),
            query_log: QueryLog::default(),
            last_result: None,
            generation: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn history(&self) -> &ChatHistory {
        &self.history
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    pub fn schema(&self) -> Option<&SchemaDescription> {
        self.schema.as_ref()
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResultCache {
        &mut self.cache
    }

    pub fn analytics(&self) -> &Analytics {
        &self.analytics
    }

    pub fn query_log(&self) -> &QueryLog {
        &self.query_log
    }

    pub fn last_result(&self) -> Option<&QueryResult> {
        self.last_result.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self, history_turns: usize) -> Option<Snapshot> {
        match (&self.database, &self.schema) {
            (Some(database), Some(schema)) => Some(Snapshot {
                database: database.clone(),
                schema: schema.clone(),
                history: self.history.recent(history_turns).to_vec(),
                generation: self.generation,
            }),
            _ => None,
        }
    }

    /// Whether work started from `snapshot` may still be committed.
    pub fn is_current(&self, snapshot: &Snapshot) -> bool {
        self.generation == snapshot.generation
            && self
                .schema
                .as_ref()
                .is_some_and(|s| s.fingerprint == snapshot.schema.fingerprint)
    }

    /// Swaps database and schema and drops every cached answer in one step.
    pub fn replace_database(&mut self, database: Database, schema: SchemaDescription) {
        info!(
            "Session {} now uses {} ({} tables)",
            self.id,
            database.path().display(),
            schema.tables.len()
        );
        self.database = Some(database);
        self.schema = Some(schema);
        self.cache.invalidate_all();
        self.last_result = None;
        self.generation += 1;
    }

    /// Back to "no schema selected".
    pub fn clear_database(&mut self) {
        self.database = None;
        self.schema = None;
        self.cache.invalidate_all();
        self.last_result = None;
        self.generation += 1;
    }

    /// Appends the user and assistant turns and updates analytics and the query log.
    pub fn record_exchange(
        &mut self,
        question: &str,
        answer: &str,
        sql: Option<String>,
        result: Option<QueryResult>,
        elapsed_ms: u64,
        cached: bool,
    ) {
        // a clarification carries no result and counts as answered
        let status = result.as_ref().map_or(QueryStatus::Ok, |r| r.status);

        self.analytics.record_outcome(status, elapsed_ms);
        if cached {
            self.analytics.record_cache_hit();
        }
        self.query_log.push(QueryLogEntry {
            question: question.to_string(),
            answer: answer.to_string(),
            sql: sql.clone(),
            status,
            elapsed_ms,
            cached,
            timestamp: Utc::now(),
        });

        if let Some(r) = &result {
            if !r.is_error() {
                self.last_result = Some(r.clone());
            }
        }
        self.history.push_user(question);
        self.history.push_assistant(answer, sql, result);
        debug!("Session {} history now has {} turns", self.id, self.history.len());
    }

    /// Clears chat history, analytics and the query log. Cache and database stay.
    pub fn reset(&mut self) {
        self.history.clear();
        self.analytics = Analytics::default();
        self.query_log.clear();
        self.last_result = None;
    }

    /// Clears chat history only.
    pub fn clear_chat(&mut self) {
        self.history.clear();
    }

    pub fn clear_cache(&mut self) {
        self.cache.invalidate_all();
    }
}

/// Shared handle to one session plus its single-question-in-flight flag.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    state: Arc<Mutex<SessionState>>,
    busy: Arc<AtomicBool>,
}

/// Marks the session busy until dropped.
#[derive(Debug)]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let n = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        let id = format!("{:x}-{:04x}", Utc::now().timestamp_millis(), n);
        Self::with_id(id)
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new(id))),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().await
    }

    /// `None` while another question is being answered.
    pub fn try_begin(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}
