//! Shared types, error model, and configuration for the company enricher.
//!
//! This crate is the foundation depended on by all other enricher crates.
//! It provides:
//! - [`EnricherError`], the unified error type
//! - Domain types ([`Record`], [`RecordKey`], [`RunId`])
//! - Configuration ([`AppConfig`], config loading and validation)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, EnrichmentConfig, GenerativeConfig, RetryConfig, SearchConfig, WarehouseConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, resolve_api_key,
    validate_config,
};
pub use error::{EnricherError, Result};
pub use types::{Record, RecordKey, RunId, columns};
