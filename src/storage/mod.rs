//! Storage module for the brand registry
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Persisting brands found by discovery
//! - Keyset pagination over known brands for the all-brands product crawl

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteBrandStore;
pub use traits::{BrandStore, StorageError, StorageResult};

use std::path::Path;

/// Initializes or opens the brand registry
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteBrandStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteBrandStore> {
    SqliteBrandStore::new(path)
}
