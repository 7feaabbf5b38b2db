use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use crate::db::insights::DatabaseInsights;
use crate::db::schema::SchemaDescription;
use crate::ingest;
use crate::pipeline::{PipelineError, RenderableAnswer};
use crate::session::analytics::AnalyticsSnapshot;
use crate::session::export;
use crate::session::history::ChatTurn;
use crate::web::state::AppState;

type ApiResult<T> = Result<T, (StatusCode, String)>;

// Request and response types

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectDatabaseRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub session_count: usize,
    pub llm_backend: String,
    pub llm_model: String,
}

fn pipeline_error(err: PipelineError) -> (StatusCode, String) {
    let status = match &err {
        PipelineError::EmptyQuestion => StatusCode::BAD_REQUEST,
        PipelineError::NoDatabase | PipelineError::Busy | PipelineError::Superseded => {
            StatusCode::CONFLICT
        }
        PipelineError::Introspection(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, err.to_string())
}

fn csv_response(file_name: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

// Sessions

pub async fn create_session(State(state): State<Arc<AppState>>) -> (StatusCode, Json<SessionCreated>) {
    let handle = state.create_session().await;
    let id = handle.lock().await.id().to_string();
    (StatusCode::CREATED, Json(SessionCreated { id }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.remove_session(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Session {} not found", id)))
    }
}

// Questions

pub async fn ask(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AskRequest>,
) -> ApiResult<Json<RenderableAnswer>> {
    let session = state.session(&id).await?;
    let answer = state
        .pipeline
        .ask(&session, &payload.question)
        .await
        .map_err(pipeline_error)?;
    Ok(Json(answer))
}

// Database selection

pub async fn select_database(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<SelectDatabaseRequest>,
) -> ApiResult<Json<SchemaDescription>> {
    let session = state.session(&id).await?;
    let path = PathBuf::from(&payload.path);
    let path = if path.is_absolute() {
        path
    } else {
        state.data_dir.join(path)
    };

    let schema = state
        .pipeline
        .select_database(&session, &path)
        .await
        .map_err(pipeline_error)?;
    Ok(Json(schema))
}

/// Accepts a database file (`.duckdb`, `.db`) or a CSV file. CSV files are
/// loaded into a fresh database first. The result becomes the session's database.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<SchemaDescription>> {
    let session = state.session(&id).await?;

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("Failed to read multipart field: {}", e),
        )
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field
            .file_name()
            .map(sanitize_file_name)
            .ok_or_else(|| (StatusCode::BAD_REQUEST, "No filename provided".to_string()))?;
        let data = field.bytes().await.map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to read file data: {}", e),
            )
        })?;
        upload = Some((file_name, data.to_vec()));
    }

    let (file_name, data) =
        upload.ok_or_else(|| (StatusCode::BAD_REQUEST, "No file provided in upload".to_string()))?;

    let db_path = store_upload(&state.data_dir, &id, &file_name, &data).await?;
    info!("Session {} uploaded {} ({} bytes)", id, file_name, data.len());

    let schema = state
        .pipeline
        .select_database(&session, &db_path)
        .await
        .map_err(pipeline_error)?;
    Ok(Json(schema))
}

const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";
const DUCKDB_MAGIC: &[u8] = b"DUCK";
// DuckDB files open with an 8 byte checksum followed by the magic bytes
const DUCKDB_MAGIC_OFFSET: usize = 8;

static UPLOAD_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Stores an upload in a directory of its own and returns the DuckDB file to
/// open. Files already in use by a session are never rewritten.
async fn store_upload(
    data_dir: &std::path::Path,
    session_id: &str,
    file_name: &str,
    data: &[u8],
) -> ApiResult<PathBuf> {
    let extension = std::path::Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "duckdb" | "db" => check_duckdb_header(data)?,
        "csv" | "tsv" => {}
        other => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("Unsupported file type: {} (supported: duckdb, db, csv, tsv)", other),
            ));
        }
    }

    let sequence = UPLOAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let upload_dir = data_dir.join(format!(
        "upload_{}_{}_{}",
        sanitize_file_name(session_id),
        chrono::Utc::now().timestamp_millis(),
        sequence
    ));
    tokio::fs::create_dir_all(&upload_dir).await.map_err(|e| {
        error!("Failed to create upload directory {}: {}", upload_dir.display(), e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload".to_string())
    })?;

    let stored = upload_dir.join(file_name);
    let partial = upload_dir.join(format!(".{}.part", file_name));

    let written = async {
        tokio::fs::write(&partial, data).await?;
        tokio::fs::rename(&partial, &stored).await
    }
    .await;
    if let Err(e) = written {
        error!("Failed to write upload {}: {}", stored.display(), e);
        let _ = tokio::fs::remove_file(&partial).await;
        return Err((StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload".to_string()));
    }

    match extension.as_str() {
        "csv" | "tsv" => {
            let db_path = stored.with_extension("duckdb");
            let target = db_path.clone();
            tokio::task::spawn_blocking(move || ingest::ingest_files(&target, &[stored]))
                .await
                .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
                .map_err(|e| (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
            Ok(db_path)
        }
        _ => Ok(stored),
    }
}

fn check_duckdb_header(data: &[u8]) -> ApiResult<()> {
    if data.starts_with(SQLITE_HEADER) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "This is a SQLite database. Only DuckDB database files (or CSV/TSV files) can be uploaded."
                .to_string(),
        ));
    }
    let magic = data.get(DUCKDB_MAGIC_OFFSET..DUCKDB_MAGIC_OFFSET + DUCKDB_MAGIC.len());
    if magic != Some(DUCKDB_MAGIC) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Not a DuckDB database file. Only DuckDB database files (or CSV/TSV files) can be uploaded."
                .to_string(),
        ));
    }
    Ok(())
}

fn sanitize_file_name(name: &str) -> String {
    let base = std::path::Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload");
    base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// Session views

pub async fn get_schema(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SchemaDescription>> {
    let session = state.session(&id).await?;
    let guard = session.lock().await;
    guard
        .schema()
        .cloned()
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No database selected".to_string()))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<ChatTurn>>> {
    let session = state.session(&id).await?;
    let turns = session.lock().await.history().turns().to_vec();
    Ok(Json(turns))
}

pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<AnalyticsSnapshot>> {
    let session = state.session(&id).await?;
    let snapshot = session.lock().await.analytics().snapshot();
    Ok(Json(snapshot))
}

pub async fn get_insights(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<DatabaseInsights>> {
    let session = state.session(&id).await?;
    let guard = session.lock().await;
    let insights = match guard.schema() {
        Some(schema) => DatabaseInsights::from_schema(schema),
        None => DatabaseInsights::from_schema(&SchemaDescription::new(Vec::new())),
    };
    Ok(Json(insights))
}

// Exports

pub async fn export_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let session = state.session(&id).await?;
    let csv = export::query_log_csv(session.lock().await.query_log().entries()).map_err(|e| {
        error!("Failed to export query log: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Export failed".to_string())
    })?;
    Ok(csv_response("query_history.csv", csv))
}

pub async fn export_result(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let session = state.session(&id).await?;
    let guard = session.lock().await;
    let result = guard
        .last_result()
        .ok_or_else(|| (StatusCode::NOT_FOUND, "No result to export".to_string()))?;
    let csv = export::result_csv(result).map_err(|e| {
        error!("Failed to export result: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Export failed".to_string())
    })?;
    Ok(csv_response("query_result.csv", csv))
}

// Session maintenance

pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.session(&id).await?;
    session.lock().await.clear_cache();
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.session(&id).await?;
    session.lock().await.clear_chat();
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let session = state.session(&id).await?;
    session.lock().await.reset();
    Ok(StatusCode::NO_CONTENT)
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        session_count: state.session_count().await,
        llm_backend: state.config.llm.backend.clone(),
        llm_model: state.config.llm.model.clone(),
    })
}
