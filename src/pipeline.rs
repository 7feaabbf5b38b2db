//! Entry point the UI calls: one question in, one renderable answer out.

use crate::agent::{AgentOutcome, QueryAgent};
use crate::cache::CacheEntry;
use crate::chart::ChartSpec;
use crate::config::AppConfig;
use crate::db::result::QueryResult;
use crate::db::sandbox::Sandbox;
use crate::db::schema::SchemaDescription;
use crate::db::{Database, IntrospectionError, Introspector};
use crate::llm::prompt::ContextBuilder;
use crate::llm::{LlmError, LlmManager, SqlGenerator};
use crate::session::SessionHandle;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum PipelineError {
    NoDatabase,
    EmptyQuestion,
    /// Another question of the same session is still being answered.
    Busy,
    /// The session switched databases while this question was in flight.
    Superseded,
    Introspection(IntrospectionError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::NoDatabase => write!(f, "No database selected for this session"),
            PipelineError::EmptyQuestion => write!(f, "Question is empty"),
            PipelineError::Busy => write!(f, "A question is already being answered in this session"),
            PipelineError::Superseded => {
                write!(f, "The database changed while the question was being answered")
            }
            PipelineError::Introspection(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<IntrospectionError> for PipelineError {
    fn from(err: IntrospectionError) -> Self {
        PipelineError::Introspection(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderableAnswer {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_spec: Option<ChartSpec>,
    pub cached: bool,
}

impl RenderableAnswer {
    fn from_outcome(outcome: AgentOutcome, cached: bool) -> Self {
        let chart_spec = outcome.result.as_ref().and_then(|r| r.chart_spec.clone());
        Self {
            text: outcome.answer,
            sql: outcome.sql,
            result: outcome.result,
            chart_spec,
            cached,
        }
    }
}

pub struct Pipeline {
    agent: QueryAgent,
    introspector: Introspector,
    context: ContextBuilder,
    pool_size: usize,
    connection_wait: Duration,
    history_turns: usize,
}

impl Pipeline {
    pub fn new(config: &AppConfig) -> Result<Self, LlmError> {
        Ok(Self::with_llm(config, LlmManager::new(&config.llm)?))
    }

    /// Uses the given backend instead of the configured one.
    pub fn with_generator(config: &AppConfig, generator: Box<dyn SqlGenerator + Send + Sync>) -> Self {
        let llm = LlmManager::with_generator(generator, Duration::from_secs(config.llm.timeout_secs));
        Self::with_llm(config, llm)
    }

    fn with_llm(config: &AppConfig, llm: LlmManager) -> Self {
        let query_timeout = Duration::from_secs(config.database.query_timeout_secs);
        let sandbox = Sandbox::new(query_timeout, config.database.display_row_cap);
        Self {
            agent: QueryAgent::new(llm, sandbox, config.llm.max_attempts),
            introspector: Introspector::new(config.database.sample_rows, config.database.row_count_cap),
            context: ContextBuilder::new(config.context.char_budget),
            pool_size: config.database.pool_size,
            // statements abandoned by a timeout keep their connection until they
            // finish; a starved pool must report before the query deadline does
            connection_wait: query_timeout / 2,
            history_turns: config.context.history_turns,
        }
    }

    /// Opens `path` read-only, introspects it and makes it the session's
    /// database. On failure the session is left without a database.
    pub async fn select_database(
        &self,
        session: &SessionHandle,
        path: &Path,
    ) -> Result<SchemaDescription, PipelineError> {
        let opened = Database::open(path, self.pool_size, self.connection_wait)
            .map_err(|e| IntrospectionError::Unreadable(e.to_string()));
        let introspected = match opened {
            Ok(db) => self.introspector.introspect(&db).await.map(|schema| (db, schema)),
            Err(e) => Err(e),
        };

        let mut state = session.lock().await;
        match introspected {
            Ok((db, schema)) => {
                state.replace_database(db, schema.clone());
                Ok(schema)
            }
            Err(e) => {
                error!("Could not use {}: {}", path.display(), e);
                state.clear_database();
                Err(e.into())
            }
        }
    }

    pub async fn ask(&self, session: &SessionHandle, question: &str) -> Result<RenderableAnswer, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let _busy = session.try_begin().ok_or(PipelineError::Busy)?;
        let start = Instant::now();

        let snapshot = {
            let mut state = session.lock().await;
            let snapshot = state.snapshot(self.history_turns).ok_or(PipelineError::NoDatabase)?;

            let hit = state
                .cache()
                .lookup(question, &snapshot.schema.fingerprint)
                .cloned();
            if let Some(entry) = hit {
                info!("Cache hit for '{}'", question);
                let answer = RenderableAnswer {
                    text: entry.summary,
                    sql: Some(entry.sql.clone()),
                    chart_spec: entry.result.chart_spec.clone(),
                    result: Some(entry.result.clone()),
                    cached: true,
                };
                let elapsed_ms = start.elapsed().as_millis() as u64;
                state.record_exchange(
                    question,
                    &answer.text,
                    Some(entry.sql),
                    Some(entry.result),
                    elapsed_ms,
                    true,
                );
                return Ok(answer);
            }
            snapshot
        };

        // no lock held while the model and the database work
        let context = self.context.build(&snapshot.schema, &snapshot.history, question);
        let outcome = self.agent.run(&snapshot.database, &context).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let mut state = session.lock().await;
        if !state.is_current(&snapshot) {
            warn!("Discarding answer to '{}': database changed mid-flight", question);
            return Err(PipelineError::Superseded);
        }

        if let (Some(sql), Some(result)) = (&outcome.sql, &outcome.result) {
            state.cache_mut().store(
                question,
                &snapshot.schema.fingerprint,
                CacheEntry {
                    sql: sql.clone(),
                    summary: outcome.answer.clone(),
                    result: result.clone(),
                },
            );
        }

        match outcome.result.as_ref().and_then(|r| r.error_kind) {
            Some(kind) => info!(
                "Question '{}' failed with {} after {} attempt(s) in {}ms",
                question, kind, outcome.attempts, elapsed_ms
            ),
            None => info!(
                "Question '{}' answered after {} attempt(s) in {}ms",
                question, outcome.attempts, elapsed_ms
            ),
        }

        state.record_exchange(
            question,
            &outcome.answer,
            outcome.sql.clone(),
            outcome.result.clone(),
            elapsed_ms,
            false,
        );
        Ok(RenderableAnswer::from_outcome(outcome, false))
    }
}

