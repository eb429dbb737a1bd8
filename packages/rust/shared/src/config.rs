//! Application configuration for the enricher.
//!
//! User config lives at `~/.enricher/enricher.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{EnricherError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "enricher.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".enricher";

// ---------------------------------------------------------------------------
// Config structs (matching enricher.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Warehouse location.
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Source/destination tables and batch settings.
    #[serde(default)]
    pub enrichment: EnrichmentConfig,

    /// Search-augmented chat service.
    #[serde(default)]
    pub search: SearchConfig,

    /// Structured-output generative service.
    #[serde(default)]
    pub generative: GenerativeConfig,
}

/// `[warehouse]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Directory holding the catalog and one database file per dataset.
    #[serde(default = "default_warehouse_dir")]
    pub root_dir: String,

    /// Location recorded for newly created datasets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            root_dir: default_warehouse_dir(),
            location: None,
        }
    }
}

fn default_warehouse_dir() -> String {
    "var/warehouse".into()
}

/// `[enrichment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Identity column shared by source and destination tables.
    #[serde(default = "default_id_column")]
    pub id_column: String,

    #[serde(default = "default_unprocessed_dataset")]
    pub unprocessed_dataset: String,

    #[serde(default = "default_processed_dataset")]
    pub processed_dataset: String,

    #[serde(default = "default_table")]
    pub unprocessed_table: String,

    #[serde(default = "default_table")]
    pub processed_table: String,

    /// Directory containing the selection query templates.
    #[serde(default = "default_query_templates_dir")]
    pub query_templates_dir: String,

    /// Directory containing prompt templates. Built-in prompts are used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_dir: Option<String>,

    /// Records per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Minimum ms between two retrieval task submissions.
    #[serde(default = "default_submission_interval")]
    pub submission_interval_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            id_column: default_id_column(),
            unprocessed_dataset: default_unprocessed_dataset(),
            processed_dataset: default_processed_dataset(),
            unprocessed_table: default_table(),
            processed_table: default_table(),
            query_templates_dir: default_query_templates_dir(),
            prompt_dir: None,
            chunk_size: default_chunk_size(),
            submission_interval_ms: default_submission_interval(),
        }
    }
}

fn default_id_column() -> String {
    "company_id".into()
}
fn default_unprocessed_dataset() -> String {
    "ol".into()
}
fn default_processed_dataset() -> String {
    "el".into()
}
fn default_table() -> String {
    "companies".into()
}
fn default_query_templates_dir() -> String {
    "sql/templates".into()
}
fn default_chunk_size() -> usize {
    25
}
fn default_submission_interval() -> u64 {
    2_400
}

/// Retry schedule for one external service.
///
/// The n-th retry waits `initial_delay_ms * backoff_factor^(n-1)`, capped at
/// `max_delay_ms` when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first call.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_search_model")]
    pub model: String,

    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_search_retry")]
    pub retry: RetryConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            model: default_search_model(),
            base_url: default_search_base_url(),
            timeout_secs: default_search_timeout(),
            retry: default_search_retry(),
        }
    }
}

fn default_search_key_env() -> String {
    "PERPLEXITY_TOKEN".into()
}
fn default_search_model() -> String {
    "sonar".into()
}
fn default_search_base_url() -> String {
    "https://api.perplexity.ai".into()
}
fn default_search_timeout() -> u64 {
    120
}
fn default_search_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        initial_delay_ms: 2_000,
        backoff_factor: 30.0,
        max_delay_ms: None,
    }
}

/// `[generative]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_generative_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_generative_model")]
    pub model: String,

    #[serde(default = "default_generative_base_url")]
    pub base_url: String,

    #[serde(default = "default_generative_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub temperature: f32,

    #[serde(default = "default_generative_retry")]
    pub retry: RetryConfig,
}

impl Default for GenerativeConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_generative_key_env(),
            model: default_generative_model(),
            base_url: default_generative_base_url(),
            timeout_secs: default_generative_timeout(),
            temperature: 0.0,
            retry: default_generative_retry(),
        }
    }
}

fn default_generative_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_generative_model() -> String {
    "gpt-4o-mini".into()
}
fn default_generative_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_generative_timeout() -> u64 {
    300
}
fn default_generative_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay_ms: 30_000,
        backoff_factor: 4.0,
        max_delay_ms: None,
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.enricher/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| EnricherError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.enricher/enricher.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| EnricherError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| EnricherError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| EnricherError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| EnricherError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| EnricherError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the API key from the env var named by `var_name`.
pub fn resolve_api_key(var_name: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(EnricherError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}

/// Validate everything the pipeline needs before touching the network.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    resolve_api_key(&config.search.api_key_env)?;
    resolve_api_key(&config.generative.api_key_env)?;

    let e = &config.enrichment;
    let names = [
        ("id_column", &e.id_column),
        ("unprocessed_dataset", &e.unprocessed_dataset),
        ("processed_dataset", &e.processed_dataset),
        ("unprocessed_table", &e.unprocessed_table),
        ("processed_table", &e.processed_table),
    ];
    for (field, value) in names {
        if value.trim().is_empty() {
            return Err(EnricherError::config(format!(
                "enrichment.{field} must not be empty"
            )));
        }
    }

    if e.chunk_size == 0 {
        return Err(EnricherError::config("enrichment.chunk_size must be at least 1"));
    }

    for (section, retry) in [
        ("search", &config.search.retry),
        ("generative", &config.generative.retry),
    ] {
        if retry.max_attempts == 0 {
            return Err(EnricherError::config(format!(
                "{section}.retry.max_attempts must be at least 1"
            )));
        }
        if retry.backoff_factor < 1.0 {
            return Err(EnricherError::config(format!(
                "{section}.retry.backoff_factor must be >= 1.0"
            )));
        }
    }

    Ok(())
}
