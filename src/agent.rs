//! Bounded propose / validate / execute / repair loop around the model.

use crate::chart::select_chart;
use crate::db::result::{QueryErrorKind, QueryResult, QueryStatus};
use crate::db::sandbox::Sandbox;
use crate::db::validator::validate_read_only;
use crate::db::Database;
use crate::llm::models::ModelReply;
use crate::llm::prompt::{QueryContext, RepairAttempt};
use crate::llm::{LlmError, LlmManager};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Terminal outcome of one question.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    /// Assistant text shown to the user.
    pub answer: String,
    /// The last SQL that was validated or executed, if any.
    pub sql: Option<String>,
    /// Absent when the model asked for clarification instead of writing SQL.
    pub result: Option<QueryResult>,
    pub attempts: usize,
}

impl AgentOutcome {
    pub fn is_error(&self) -> bool {
        self.result.as_ref().is_some_and(QueryResult::is_error)
    }

    fn failed(sql: Option<String>, mut result: QueryResult, attempts: usize, answer: String) -> Self {
        result.chart_spec = Some(select_chart(&result));
        Self {
            answer,
            sql,
            result: Some(result),
            attempts,
        }
    }
}

pub struct QueryAgent {
    llm: LlmManager,
    sandbox: Sandbox,
    max_attempts: usize,
}

impl QueryAgent {
    pub fn new(llm: LlmManager, sandbox: Sandbox, max_attempts: usize) -> Self {
        Self {
            llm,
            sandbox,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Each call starts a fresh attempt counter and repair context.
    pub async fn run(&self, db: &Database, context: &QueryContext) -> AgentOutcome {
        let mut repairs: Vec<RepairAttempt> = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let reply = match context.render(&repairs) {
                Ok(prompt) => self.llm.generate_sql(&prompt).await,
                Err(e) => Err(e),
            };
            let candidate = match reply {
                Ok(ModelReply::Sql(sql)) => sql,
                Ok(ModelReply::Clarification(text)) => {
                    info!("Model asked for clarification on attempt {}", attempt);
                    return AgentOutcome {
                        answer: text,
                        sql: None,
                        result: None,
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    warn!("Model call failed on attempt {}: {}", attempt, e);
                    let detail = provider_message(&e);
                    let sql = repairs.last().map(|r| r.sql.clone());
                    return AgentOutcome::failed(
                        sql,
                        QueryResult::error(QueryErrorKind::Provider, detail.clone(), 0),
                        attempt,
                        detail,
                    );
                }
            };

            let sql = match validate_read_only(&candidate) {
                Ok(sql) => sql,
                Err(reason) => {
                    warn!("Rejected candidate SQL: {}", reason);
                    let detail = reason.to_string();
                    return AgentOutcome::failed(
                        Some(candidate),
                        QueryResult::error(QueryErrorKind::UnsafeQuery, detail.clone(), 0),
                        attempt,
                        detail,
                    );
                }
            };

            debug!("Attempt {} executing: {}", attempt, sql);
            let mut result = self.sandbox.execute(db, &sql).await;

            if !result.is_error() {
                result.chart_spec = Some(select_chart(&result));
                let answer = summarize(&result);
                info!("Answered in {} attempt(s)", attempt);
                return AgentOutcome {
                    answer,
                    sql: Some(sql),
                    result: Some(result),
                    attempts: attempt,
                };
            }

            let kind = result.error_kind.unwrap_or(QueryErrorKind::ConstraintOrRuntime);
            let detail = result.error_detail.clone().unwrap_or_default();

            if !kind.is_repairable() {
                let answer = match kind {
                    QueryErrorKind::Timeout => {
                        format!("{}. Try a narrower question or add filters.", detail)
                    }
                    _ => detail,
                };
                return AgentOutcome::failed(Some(sql), result, attempt, answer);
            }

            if attempt >= self.max_attempts {
                warn!("Giving up after {} attempts: {}", attempt, detail);
                let answer = format!(
                    "I could not produce a working query after {} attempts. {}: {}",
                    attempt, kind, detail
                );
                return AgentOutcome::failed(Some(sql), result, attempt, answer);
            }

            debug!("Feeding {} back to the model", kind);
            repairs.push(RepairAttempt::new(sql, &detail));
        }
    }
}

fn provider_message(err: &LlmError) -> String {
    format!(
        "The language model could not be reached ({}). Please try again later.",
        err
    )
}

/// Plain-language description of a successful result.
pub fn summarize(result: &QueryResult) -> String {
    match result.status {
        QueryStatus::Error => result.error_detail.clone().unwrap_or_default(),
        QueryStatus::Empty => "The query ran successfully but returned no rows.".to_string(),
        QueryStatus::Ok => {
            if result.rows.len() == 1 && result.columns.len() == 1 {
                let column = &result.columns[0].name;
                let value = result.rows[0].get(column).map(display_value).unwrap_or_default();
                return format!("The answer is {} ({}).", value, column);
            }
            let noun = if result.rows.len() == 1 { "row" } else { "rows" };
            if result.truncated {
                format!(
                    "Showing the first {} {}; more rows matched.",
                    result.rows.len(),
                    noun
                )
            } else {
                format!("Found {} {}.", result.rows.len(), noun)
            }
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}
