#![allow(dead_code)]

use async_trait::async_trait;
use datachat::config::AppConfig;
use datachat::llm::models::Prompt;
use datachat::llm::{LlmError, SqlGenerator};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Creates a database file from a SQL script and closes it again.
pub fn create_db(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    let conn = duckdb::Connection::open(&path).unwrap();
    conn.execute_batch(script).unwrap();
    drop(conn);
    path
}

/// How long tests wait for a pooled connection.
pub const POOL_WAIT: Duration = Duration::from_secs(5);

pub const STUDENTS: &str = "
    CREATE TABLE students (id INTEGER, name VARCHAR, grade INTEGER);
    INSERT INTO students VALUES (1, 'Ann', 90), (2, 'Bo', 80), (3, 'Cy', 70);
";

pub const GRADES: &str = "
    CREATE TABLE grades (subject VARCHAR, grade DOUBLE);
    INSERT INTO grades VALUES ('Math', 90), ('Math', 80), ('Science', 70), ('Science', 75);
";

/// Replays canned replies in order and records every prompt it receives.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<Result<String, LlmError>>>>,
    prompts: Arc<Mutex<Vec<Prompt>>>,
    delay: Option<Duration>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect())),
            ..Default::default()
        }
    }

    pub fn failing(err: LlmError) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from([Err(err)]))),
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl SqlGenerator for ScriptedGenerator {
    async fn complete(&self, prompt: &Prompt) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::ResponseError("script exhausted".to_string())))
    }
}

pub fn config() -> AppConfig {
    AppConfig::default()
}
