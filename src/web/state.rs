use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::session::SessionHandle;
use axum::http::StatusCode;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::info;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: Pipeline,
    pub data_dir: PathBuf,
    pub sessions: RwLock<HashMap<String, SessionHandle>>,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: Pipeline, data_dir: PathBuf) -> Self {
        Self {
            config,
            pipeline,
            data_dir,
            sessions: RwLock::new(HashMap::new()),
            startup_time: chrono::Utc::now(),
        }
    }

    pub async fn create_session(&self) -> SessionHandle {
        let handle = SessionHandle::new();
        let id = handle.lock().await.id().to_string();
        self.sessions.write().await.insert(id.clone(), handle.clone());
        info!("Created session {}", id);
        handle
    }

    pub async fn session(&self, id: &str) -> Result<SessionHandle, (StatusCode, String)> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| (StatusCode::NOT_FOUND, format!("Session {} not found", id)))
    }

    /// Drops the session and everything it owns once in-flight work lets go of it.
    pub async fn remove_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!("Removed session {}", id);
        }
        removed
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
