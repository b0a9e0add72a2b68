//! Catalog-Crawler: a concurrent marketplace catalog ingester
//!
//! This crate crawls a marketplace's catalog endpoints (brands, products,
//! per-warehouse stock quantities), flattens the nested responses into flat
//! records and republishes them to a message sink.

pub mod api;
pub mod config;
pub mod crawler;
pub mod decode;
pub mod model;
pub mod output;
pub mod sink;
pub mod storage;

use thiserror::Error;

pub use api::{AttemptError, TransportError};
pub use sink::SinkError;
pub use storage::StorageError;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Brand discovery failed for letter '{letter}': {source}")]
    Discovery {
        letter: String,
        source: TransportError,
    },

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlOrchestrator, PaginatedFetchScheduler};
pub use model::{Brand, Product, QuantityRecord};
pub use output::RunReport;
pub use sink::PublishSink;
