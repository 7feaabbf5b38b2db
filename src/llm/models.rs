use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::debug;

/// What is sent to a backend: fixed instructions plus the per-question context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Single-string form for completion-style backends.
    pub fn flattened(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }

    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }
}

/// Model output after SQL extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "text", rename_all = "snake_case")]
pub enum ModelReply {
    /// A candidate statement, not yet validated.
    Sql(String),
    /// Plain text without any statement, e.g. a request for clarification.
    Clarification(String),
}

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP",
];

// Shapes a non-SELECT statement must have before unfenced text counts as SQL.
static STATEMENT_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?ix)^(
            with\s+(recursive\s+)?[a-z_"][\w"]*\s*(\([^)]*\)\s*)?as\s*((not\s+)?materialized\s*)?\(
          | insert\s+(or\s+\w+\s+)?into\s
          | update\s+[\w".]+\s+set\s
          | delete\s+from\s
          | (create|drop)\s+(or\s+replace\s+)?(temp\s+|temporary\s+)?(table|view|index|schema|sequence|macro|type)\b
          | alter\s+(table|view|sequence)\s
        )"#,
    )
    .expect("statement shape pattern is valid")
});

static FROM_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bfrom\b").expect("from clause pattern is valid"));

impl ModelReply {
    pub fn parse(content: &str) -> Self {
        // Fenced ```sql block
        if let Some(start) = content.find("```sql") {
            let after = &content[start + 6..];
            let sql = match after.find("```") {
                Some(end) => &after[..end],
                None => after,
            };
            let sql = sql.trim();
            if !sql.is_empty() {
                debug!("Extracted SQL from sql code block");
                return ModelReply::Sql(sql.to_string());
            }
        }

        // Fence without a language tag
        if let Some(start) = content.find("```") {
            let after = &content[start + 3..];
            if let Some(end) = after.find("```") {
                let sql = after[..end].trim();
                if starts_with_keyword(sql) {
                    debug!("Extracted SQL from plain code block");
                    return ModelReply::Sql(sql.to_string());
                }
            }
        }

        // Line scanning: a line starting with a SQL keyword up to the terminating semicolon
        let lines: Vec<&str> = content.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if !starts_with_keyword(line.trim()) {
                continue;
            }
            let mut sql = line.trim().to_string();
            if !sql.ends_with(';') {
                for next_line in lines.iter().skip(i + 1).map(|l| l.trim()) {
                    if next_line.is_empty() || next_line.starts_with("```") {
                        break;
                    }
                    sql.push(' ');
                    sql.push_str(next_line);
                    if next_line.ends_with(';') {
                        break;
                    }
                }
            }
            if !looks_like_statement(&sql) {
                continue;
            }
            debug!("Extracted SQL using line scanning");
            return ModelReply::Sql(sql);
        }

        ModelReply::Clarification(content.trim().to_string())
    }
}

fn first_word(text: &str) -> String {
    text.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_uppercase()
}

fn starts_with_keyword(text: &str) -> bool {
    SQL_KEYWORDS.contains(&first_word(text).as_str())
}

/// Unfenced text only counts as SQL when it has the structure of a statement,
/// so prose that happens to open with "With" or "Select" stays a clarification.
fn looks_like_statement(candidate: &str) -> bool {
    if candidate.ends_with('?') {
        return false;
    }
    if first_word(candidate) == "SELECT" {
        return candidate.ends_with(';') || FROM_CLAUSE.is_match(candidate);
    }
    STATEMENT_SHAPE.is_match(candidate)
}
