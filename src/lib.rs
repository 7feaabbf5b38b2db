//! Natural-language questions over a file-based DuckDB database: schema
//! introspection, bounded model prompting, validated read-only execution,
//! per-session caching, chart selection and analytics.

pub mod agent;
pub mod cache;
pub mod chart;
pub mod config;
pub mod db;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod session;
pub mod util;
pub mod web;

pub use pipeline::{Pipeline, PipelineError, RenderableAnswer};
pub use session::SessionHandle;
