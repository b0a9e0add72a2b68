//! Configuration module for Catalog-Crawler
//!
//! This module handles loading, parsing, and validating the TOML configuration
//! file, layering environment overrides on top of it, and loading the static
//! brand-list alphabet.
//!
//! # Example
//!
//! ```no_run
//! use catalog_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Some(Path::new("crawler.toml"))).unwrap();
//! println!("Catalog concurrency: {}", config.crawler.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrokerConfig, Config, CrawlerConfig, EndpointsConfig, FileSinkConfig, HttpConfig, SinkConfig,
    StorageConfig, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY,
};

// Re-export parser functions
pub use parser::{
    apply_overrides, compute_config_hash, load_config, load_config_with_hash, load_letters,
};
pub use validation::{normalize, validate, MAX_DETAIL_BATCH};
