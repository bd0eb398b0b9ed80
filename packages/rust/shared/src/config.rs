//! Application configuration for csvagent.
//!
//! User config lives at `~/.csvagent/csvagent.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CsvAgentError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "csvagent.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".csvagent";

// ---------------------------------------------------------------------------
// Config structs (matching csvagent.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Hosted language model settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Parent directory for per-run extraction directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    /// Column shared by every CSV, used as the outer-join key.
    #[serde(default = "default_merge_key")]
    pub merge_key: String,

    /// Table name the merged dataset is exposed as.
    #[serde(default = "default_table_name")]
    pub table_name: String,

    /// Rows of the query result rendered into the summarization prompt.
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,

    /// Keep the extraction directory after the run.
    #[serde(default)]
    pub keep_extracted: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            merge_key: default_merge_key(),
            table_name: default_table_name(),
            max_result_rows: default_max_result_rows(),
            keep_extracted: false,
        }
    }
}

fn default_work_dir() -> String {
    "~/.csvagent/work".into()
}
fn default_merge_key() -> String {
    "CHAVE DE ACESSO".into()
}
fn default_table_name() -> String {
    "fiscal_data".into()
}
fn default_max_result_rows() -> usize {
    200
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for both SQL generation and answer writing.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature for SQL generation.
    #[serde(default = "default_query_temperature")]
    pub query_temperature: f32,

    /// Sampling temperature for the final answer.
    #[serde(default = "default_answer_temperature")]
    pub answer_temperature: f32,

    /// Reasoning token budget; 0 disables thinking.
    #[serde(default)]
    pub thinking_budget: u32,

    /// Language the final answer is written in.
    #[serde(default = "default_answer_language")]
    pub answer_language: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            query_temperature: default_query_temperature(),
            answer_temperature: default_answer_temperature(),
            thinking_budget: 0,
            answer_language: default_answer_language(),
        }
    }
}

fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".into()
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_query_temperature() -> f32 {
    0.0
}
fn default_answer_temperature() -> f32 {
    0.1
}
fn default_answer_language() -> String {
    "Brazilian Portuguese".into()
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Outer-join key column.
    pub merge_key: String,
    /// SQL table name for the merged dataset.
    pub table_name: String,
    /// Result rows rendered for the answer prompt.
    pub max_result_rows: usize,
    /// Temperature for SQL generation.
    pub query_temperature: f32,
    /// Temperature for the final answer.
    pub answer_temperature: f32,
    /// Reasoning token budget.
    pub thinking_budget: u32,
    /// Language of the final answer.
    pub answer_language: String,
}

impl From<&AppConfig> for RunConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            merge_key: config.defaults.merge_key.clone(),
            table_name: config.defaults.table_name.clone(),
            max_result_rows: config.defaults.max_result_rows,
            query_temperature: config.llm.query_temperature,
            answer_temperature: config.llm.answer_temperature,
            thinking_budget: config.llm.thinking_budget,
            answer_language: config.llm.answer_language.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.csvagent/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CsvAgentError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.csvagent/csvagent.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CsvAgentError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CsvAgentError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CsvAgentError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CsvAgentError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CsvAgentError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the model API key from the env var named in the config.
///
/// The binary loads a `.env` file into the environment first, so the key may
/// come from there too.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(CsvAgentError::config(format!(
            "model API key not found. Set the {var_name} environment variable \
             or add {var_name}='your-key' to a .env file in the working directory."
        ))),
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
