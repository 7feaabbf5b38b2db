use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use datachat::config::{AppConfig, CliArgs, Command};
use datachat::db::sample::create_sample_database;
use datachat::ingest::ingest_files;
use datachat::util::logging::init_tracing;
use datachat::web::{self, state::AppState};
use datachat::{Pipeline, SessionHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Ask { db, question } => ask_once(config, db, question).await,
        Command::Seed { path } => {
            create_sample_database(&path)?;
            println!("Sample database written to {}", path.display());
            Ok(())
        }
        Command::Import { db, files } => {
            let tables = tokio::task::spawn_blocking(move || ingest_files(&db, files.as_slice())).await??;
            for table in tables {
                println!("{}: {} rows", table.table, table.rows);
            }
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Ensure data directory exists
    let data_dir = PathBuf::from(&config.data_dir);
    if !data_dir.exists() {
        info!("Creating data directory: {}", config.data_dir);
        std::fs::create_dir_all(&data_dir)?;
    }

    info!("Initializing LLM backend: {} ({})", config.llm.backend, config.llm.model);
    let pipeline = Pipeline::new(&config)?;

    let web_config = config.web.clone();
    let app_state = Arc::new(AppState::new(config, pipeline, data_dir));

    info!("Starting datachat server on {}:{}", web_config.host, web_config.port);
    match web::run_server(web_config, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

async fn ask_once(
    config: AppConfig,
    db: PathBuf,
    question: String,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pipeline = Pipeline::new(&config)?;
    let session = SessionHandle::new();

    pipeline.select_database(&session, &db).await?;
    let answer = pipeline.ask(&session, &question).await?;

    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}
