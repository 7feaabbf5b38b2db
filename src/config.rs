use clap::{Parser, Subcommand};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    pub pool_size: usize,
    pub query_timeout_secs: u64,
    pub display_row_cap: usize,
    pub sample_rows: usize,
    pub row_count_cap: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub backend: String, // "remote" or "ollama"
    pub model: String,   // Model name
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: usize,
    pub temperature: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ContextConfig {
    /// Character budget for the rendered model prompt
    pub char_budget: usize,
    /// How many prior chat turns are offered to the context builder
    pub history_turns: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub web: WebConfig,
    pub llm: LlmConfig,
    pub context: ContextConfig,
    pub data_dir: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long, global = true)]
    pub port: Option<u16>,

    /// Directory for uploaded database files
    #[arg(long, global = true)]
    pub data_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Ask a single question against a database file and print the answer as JSON
    Ask {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
        question: String,
    },
    /// Create the sample university database
    Seed {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Load CSV files into a database file, one table per file
    Import {
        #[arg(long, value_name = "FILE")]
        db: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

impl AppConfig {
    pub fn new(args: &CliArgs) -> Result<Self, ConfigError> {
        // Start with compiled-in defaults so partial files still deserialize
        let mut config_builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

        // Add configuration from file if specified
        if let Some(config_path) = &args.config {
            config_builder = config_builder.add_source(File::from(config_path.as_path()));
        } else {
            // Check for config in default locations
            let default_locations = vec![
                "config.toml",
                "config/config.toml",
                "/etc/datachat/config.toml",
            ];

            for location in default_locations {
                if Path::new(location).exists() {
                    config_builder =
                        config_builder.add_source(File::new(location, config::FileFormat::Toml));
                    break;
                }
            }
        }

        // DATACHAT__LLM__API_KEY and friends
        config_builder = config_builder.add_source(
            Environment::with_prefix("DATACHAT")
                .prefix_separator("__")
                .separator("__"),
        );

        // Build the config
        let mut config: AppConfig = config_builder.build()?.try_deserialize()?;

        // Override with command line args if provided
        if let Some(host) = &args.host {
            config.web.host = host.clone();
        }
        if let Some(port) = args.port {
            config.web.port = port;
        }
        if let Some(data_dir) = &args.data_dir {
            config.data_dir = data_dir.clone();
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.max_attempts == 0 {
            return Err(ConfigError::Message(
                "llm.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.database.display_row_cap == 0 {
            return Err(ConfigError::Message(
                "database.display_row_cap must be at least 1".to_string(),
            ));
        }
        if self.database.query_timeout_secs == 0 || self.llm.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "database.query_timeout_secs and llm.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::Message(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// Default implementation
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                pool_size: 4,
                query_timeout_secs: 10,
                display_row_cap: 1000,
                sample_rows: 5,
                row_count_cap: 1_000_000,
            },
            web: WebConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            llm: LlmConfig {
                backend: "remote".to_string(),
                model: "gemma2-9b-it".to_string(),
                api_key: None,
                api_url: Some("https://api.groq.com/openai/v1/chat/completions".to_string()),
                timeout_secs: 60,
                max_attempts: 3,
                temperature: 0.0,
            },
            context: ContextConfig {
                char_budget: 12_000,
                history_turns: 6,
            },
            data_dir: "data".to_string(),
        }
    }
}
