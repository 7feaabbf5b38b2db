use crate::db::result::QueryResult;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Case-folds, collapses whitespace runs and drops trailing `?`, `.` and `!`.
pub fn normalize_question(question: &str) -> String {
    let collapsed = question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    collapsed
        .trim_end_matches(['?', '.', '!'])
        .trim_end()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    question: String,
    fingerprint: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub sql: String,
    pub summary: String,
    pub result: QueryResult,
}

/// Exact-text answer cache keyed by normalized question and schema fingerprint.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, question: &str, fingerprint: &str) -> Option<&CacheEntry> {
        let key = CacheKey {
            question: normalize_question(question),
            fingerprint: fingerprint.to_string(),
        };
        self.entries.get(&key)
    }

    /// Error results are never cached so a later attempt can succeed.
    pub fn store(&mut self, question: &str, fingerprint: &str, entry: CacheEntry) {
        if entry.result.is_error() {
            debug!("Not caching error result for '{}'", question);
            return;
        }
        let key = CacheKey {
            question: normalize_question(question),
            fingerprint: fingerprint.to_string(),
        };
        self.entries.insert(key, entry);
    }

    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            debug!("Invalidating {} cached answers", self.entries.len());
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
