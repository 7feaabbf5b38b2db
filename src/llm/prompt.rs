//! Builds the bounded model context for one question.
//!
//! The schema structure and the question are always present. Whatever is
//! left of the character budget goes to the most recent chat turns first and
//! then to per-table sample rows; anything that does not fit is dropped and
//! counted.

use crate::db::schema::{SchemaDescription, TableInfo};
use crate::llm::LlmError;
use crate::llm::models::Prompt;
use crate::session::history::{ChatTurn, Role};
use minijinja::{context, Environment};
use serde::Serialize;
use std::sync::LazyLock;
use tracing::debug;

/// Longest error text fed back to the model on a repair attempt.
pub const MAX_REPAIR_ERROR_CHARS: usize = 500;

// Headings and separators the templates add around the variable parts.
const TEMPLATE_OVERHEAD: usize = 96;

const SYSTEM_TEMPLATE: &str = r#"You translate questions about a DuckDB database into one read-only SQL query.
Rules:
- Reply with exactly one SELECT statement (a WITH ... SELECT is fine) inside a ```sql code block.
- Never modify anything: no INSERT, UPDATE, DELETE, DROP, ALTER, CREATE or any other DDL/DML.
- Use only the tables and columns in the schema. Column names are case sensitive; quote names with spaces.
- Use table aliases when joining.
- When computing a ratio, cast the numerator to DOUBLE.
- Sample rows only illustrate the data. Compute counts and aggregates with SQL.
- If the question cannot be answered from this schema, reply in plain text asking for clarification and write no SQL."#;

const USER_TEMPLATE: &str = r#"### Schema
{{ schema }}
{% if samples %}

### Sample rows
{% for block in samples %}
{{ block }}
{% endfor %}
{% endif %}
{% if history %}

### Conversation so far
{% for line in history %}
{{ line }}
{% endfor %}
{% endif %}
{% if repairs %}

### Failed attempts
{% for attempt in repairs %}
Attempt {{ loop.index }}:
```sql
{{ attempt.sql }}
```
Error: {{ attempt.error }}
{% endfor %}
Write a corrected query.
{% endif %}

### Question
{{ question }}"#;

static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_template("system", SYSTEM_TEMPLATE)
        .expect("Failed to add system prompt template");
    env.add_template("user", USER_TEMPLATE)
        .expect("Failed to add user prompt template");
    env
});

/// A failed candidate and the error it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairAttempt {
    pub sql: String,
    pub error: String,
}

impl RepairAttempt {
    pub fn new(sql: impl Into<String>, error: &str) -> Self {
        let error = match error.char_indices().nth(MAX_REPAIR_ERROR_CHARS) {
            Some((cut, _)) => format!("{}...", &error[..cut]),
            None => error.to_string(),
        };
        Self {
            sql: sql.into(),
            error,
        }
    }
}

/// Context for one question. Deterministic for identical inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    pub question: String,
    pub schema: String,
    /// Chronological.
    pub history: Vec<String>,
    pub samples: Vec<String>,
    pub trimmed_turns: usize,
    pub trimmed_samples: usize,
}

impl QueryContext {
    pub fn render(&self, repairs: &[RepairAttempt]) -> Result<Prompt, LlmError> {
        let system = TEMPLATES
            .get_template("system")
            .and_then(|t| t.render(context! {}))
            .map_err(|e| LlmError::PromptError(e.to_string()))?;

        let user = TEMPLATES
            .get_template("user")
            .and_then(|t| {
                t.render(context! {
                    schema => &self.schema,
                    samples => &self.samples,
                    history => &self.history,
                    repairs => repairs,
                    question => &self.question,
                })
            })
            .map_err(|e| LlmError::PromptError(e.to_string()))?;

        Ok(Prompt { system, user })
    }
}

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    char_budget: usize,
}

impl ContextBuilder {
    pub fn new(char_budget: usize) -> Self {
        Self { char_budget }
    }

    /// `history` is chronological; the newest turns are kept first.
    pub fn build(&self, schema: &SchemaDescription, history: &[ChatTurn], question: &str) -> QueryContext {
        let schema_text = describe_schema(schema);
        let fixed = SYSTEM_TEMPLATE.len() + schema_text.len() + question.len() + TEMPLATE_OVERHEAD;
        let mut remaining = self.char_budget.saturating_sub(fixed);

        let mut history_lines = Vec::new();
        let mut trimmed_turns = 0;
        for turn in history.iter().rev() {
            let line = describe_turn(turn);
            if trimmed_turns == 0 && line.len() < remaining {
                remaining -= line.len() + 1;
                history_lines.push(line);
            } else {
                // once one turn is dropped every older one goes too
                trimmed_turns += 1;
            }
        }
        history_lines.reverse();

        let mut samples = Vec::new();
        let mut trimmed_samples = 0;
        for table in schema.tables.iter().filter(|t| !t.sample_rows.is_empty()) {
            let block = describe_samples(table);
            if block.len() < remaining {
                remaining -= block.len() + 1;
                samples.push(block);
            } else {
                trimmed_samples += 1;
            }
        }

        if trimmed_turns > 0 || trimmed_samples > 0 {
            debug!(
                "Context budget {} exceeded: dropped {} turns and {} sample blocks",
                self.char_budget, trimmed_turns, trimmed_samples
            );
        }

        QueryContext {
            question: question.trim().to_string(),
            schema: schema_text,
            history: history_lines,
            samples,
            trimmed_turns,
            trimmed_samples,
        }
    }
}

fn describe_schema(schema: &SchemaDescription) -> String {
    if schema.tables.is_empty() {
        return "-- the database has no tables".to_string();
    }
    schema
        .tables
        .iter()
        .map(|t| {
            let approx = if t.row_count_capped { "at least " } else { "" };
            format!(
                "-- {}: {}{} rows\n{}",
                t.name,
                approx,
                t.row_count,
                t.to_create_table_sql()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn describe_samples(table: &TableInfo) -> String {
    let mut block = format!("{}:", table.name);
    for row in &table.sample_rows {
        block.push('\n');
        block.push_str(&serde_json::to_string(row).unwrap_or_default());
    }
    block
}

fn describe_turn(turn: &ChatTurn) -> String {
    match turn.role {
        Role::User => format!("User: {}", turn.content),
        Role::Assistant => match &turn.sql {
            Some(sql) => format!("Assistant: {}\nSQL: {}", turn.content, sql),
            None => format!("Assistant: {}", turn.content),
        },
    }
}
