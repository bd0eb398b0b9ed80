//! Shared types, error model, and configuration for csvagent.
//!
//! This crate is the foundation depended on by all other csvagent crates.
//! It provides:
//! - [`CsvAgentError`]: the unified error type
//! - Domain types ([`RunId`], [`ColumnType`], [`ColumnSchema`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, LlmConfig, RunConfig, config_dir, config_file_path, expand_home,
    init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{CsvAgentError, Result};
pub use types::{ColumnSchema, ColumnType, RunId, render_schema};
