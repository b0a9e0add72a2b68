//! Storage traits and error types
//!
//! This module defines the trait interface for the brand registry and
//! associated error types.

use crate::model::Brand;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid stored value in column '{column}': {value}")]
    InvalidValue { column: &'static str, value: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistent registry of discovered brands
///
/// Brand discovery writes to it; the all-brands product crawl reads from it
/// instead of rediscovering brands.
pub trait BrandStore {
    /// Inserts new brands and refreshes the name and update time of known ones
    ///
    /// # Arguments
    ///
    /// * `brands` - Brands to store
    ///
    /// # Returns
    ///
    /// The number of brands written
    fn upsert_brands(&mut self, brands: &[Brand]) -> StorageResult<usize>;

    /// Returns up to `limit` brands with an id greater than `last_id`, by id
    ///
    /// Pass `0` to start from the beginning, then the last returned id to
    /// continue.
    fn brands_after(&self, last_id: u32, limit: usize) -> StorageResult<Vec<Brand>>;

    /// Counts stored brands
    fn count_brands(&self) -> StorageResult<u64>;

    /// Looks up a single brand
    fn get_brand(&self, id: u32) -> StorageResult<Option<Brand>>;
}
