use crate::db::result::QueryResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of the conversation. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Strictly increasing within a session, also across `clear`.
    pub sequence: u64,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
    pub timestamp: DateTime<Utc>,
}

/// Append-only chat log.
#[derive(Debug, Default)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
    next_sequence: u64,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) -> &ChatTurn {
        self.push(Role::User, content.into(), None, None)
    }

    pub fn push_assistant(
        &mut self,
        content: impl Into<String>,
        sql: Option<String>,
        result: Option<QueryResult>,
    ) -> &ChatTurn {
        self.push(Role::Assistant, content.into(), sql, result)
    }

    fn push(&mut self, role: Role, content: String, sql: Option<String>, result: Option<QueryResult>) -> &ChatTurn {
        let turn = ChatTurn {
            sequence: self.next_sequence,
            role,
            content,
            sql,
            result,
            timestamp: Utc::now(),
        };
        self.next_sequence += 1;
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// The last `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatTurn] {
        &self.turns[self.turns.len().saturating_sub(n)..]
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
