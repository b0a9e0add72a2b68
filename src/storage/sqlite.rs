//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the BrandStore trait.

use crate::model::{Brand, DATETIME_FORMAT, DATE_FORMAT};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{BrandStore, StorageError, StorageResult};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite brand registry
pub struct SqliteBrandStore {
    conn: Connection,
}

impl SqliteBrandStore {
    /// Opens or creates the registry
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteBrandStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

type BrandRow = (u32, String, String, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<BrandRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_brand((id, name, created_at, updated_at): BrandRow) -> StorageResult<Brand> {
    let created_at = NaiveDate::parse_from_str(&created_at, DATE_FORMAT).map_err(|_| {
        StorageError::InvalidValue {
            column: "created_at",
            value: created_at.clone(),
        }
    })?;
    let updated_at =
        NaiveDateTime::parse_from_str(&updated_at, DATETIME_FORMAT).map_err(|_| {
            StorageError::InvalidValue {
                column: "updated_at",
                value: updated_at.clone(),
            }
        })?;

    Ok(Brand {
        id,
        name,
        created_at,
        updated_at,
    })
}

impl BrandStore for SqliteBrandStore {
    fn upsert_brands(&mut self, brands: &[Brand]) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO brands (id, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                     name = excluded.name,
                     updated_at = excluded.updated_at",
            )?;

            for brand in brands {
                stmt.execute(params![
                    brand.id,
                    brand.name,
                    brand.created_at.format(DATE_FORMAT).to_string(),
                    brand.updated_at.format(DATETIME_FORMAT).to_string(),
                ])?;
            }
        }

        tx.commit()?;
        tracing::debug!("Stored {} brands", brands.len());
        Ok(brands.len())
    }

    fn brands_after(&self, last_id: u32, limit: usize) -> StorageResult<Vec<Brand>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, created_at, updated_at FROM brands
             WHERE id > ?1 ORDER BY id LIMIT ?2",
        )?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![last_id, limit], read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(into_brand).collect()
    }

    fn count_brands(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM brands", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn get_brand(&self, id: u32) -> StorageResult<Option<Brand>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, created_at, updated_at FROM brands WHERE id = ?1",
                params![id],
                read_row,
            )
            .optional()?;

        row.map(into_brand).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn brand(id: u32, name: &str, day: u32) -> Brand {
        Brand::new(id, name, Utc.with_ymd_and_hms(2025, 4, day, 10, 30, 0).unwrap())
    }

    #[test]
    fn test_create_in_memory() {
        assert!(SqliteBrandStore::new_in_memory().is_ok());
    }

    #[test]
    fn test_upsert_and_get() {
        let mut store = SqliteBrandStore::new_in_memory().unwrap();
        store.upsert_brands(&[brand(1, "Acme", 1)]).unwrap();

        let stored = store.get_brand(1).unwrap().unwrap();
        assert_eq!(stored, brand(1, "Acme", 1));
        assert!(store.get_brand(2).unwrap().is_none());
    }

    #[test]
    fn test_upsert_keeps_creation_date() {
        let mut store = SqliteBrandStore::new_in_memory().unwrap();
        store.upsert_brands(&[brand(1, "Acme", 1)]).unwrap();
        store.upsert_brands(&[brand(1, "Acme Corp", 9)]).unwrap();

        let stored = store.get_brand(1).unwrap().unwrap();
        assert_eq!(stored.name, "Acme Corp");
        assert_eq!(stored.created_at, brand(1, "", 1).created_at);
        assert_eq!(stored.updated_at, brand(1, "", 9).updated_at);
        assert_eq!(store.count_brands().unwrap(), 1);
    }

    #[test]
    fn test_keyset_pagination() {
        let mut store = SqliteBrandStore::new_in_memory().unwrap();
        let brands: Vec<Brand> = [5, 1, 3, 9, 7]
            .iter()
            .map(|&id| brand(id, &format!("Brand {}", id), 1))
            .collect();
        store.upsert_brands(&brands).unwrap();

        let first = store.brands_after(0, 2).unwrap();
        let second = store.brands_after(first[1].id, 2).unwrap();
        let third = store.brands_after(second[1].id, 2).unwrap();

        let ids = |page: &[Brand]| page.iter().map(|b| b.id).collect::<Vec<_>>();
        assert_eq!(ids(&first), vec![1, 3]);
        assert_eq!(ids(&second), vec![5, 7]);
        assert_eq!(ids(&third), vec![9]);
        assert!(store.brands_after(9, 2).unwrap().is_empty());
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("brands.db");

        {
            let mut store = SqliteBrandStore::new(&path).unwrap();
            store.upsert_brands(&[brand(4, "Globex", 2)]).unwrap();
        }

        let store = SqliteBrandStore::new(&path).unwrap();
        assert_eq!(store.count_brands().unwrap(), 1);
    }
}
