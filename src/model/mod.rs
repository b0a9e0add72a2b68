//! Catalog entities
//!
//! These are the flat records published to the sink. Field names and date
//! formats match the downstream analytical tables.

mod format;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

/// Date format of the downstream tables
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Timestamp format of the downstream tables
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A marketplace brand, identified by `id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Brand {
    pub id: u32,
    pub name: String,
    #[serde(with = "format::date")]
    pub created_at: NaiveDate,
    #[serde(with = "format::datetime")]
    pub updated_at: NaiveDateTime,
}

impl Brand {
    /// Creates a brand stamped with the given observation time
    pub fn new(id: u32, name: impl Into<String>, seen_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            created_at: seen_at.date_naive(),
            updated_at: seen_at.naive_utc(),
        }
    }
}

/// A product listed in a brand's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub seller_id: u32,
    pub brand_id: u32,
    pub subject_id: u32,
    pub root: Option<u64>,
    pub kind_id: Option<u8>,
    pub subject_parent_id: Option<u32>,
    pub match_id: Option<u64>,
    #[serde(with = "format::date")]
    pub created_at: NaiveDate,
    #[serde(with = "format::datetime")]
    pub updated_at: NaiveDateTime,
}

/// Stock of one size option of one product in one warehouse
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuantityRecord {
    pub product_id: u64,
    pub option_id: u64,
    pub store_id: u32,
    pub quantity: u32,
    #[serde(with = "format::date")]
    pub date: NaiveDate,
    #[serde(with = "format::datetime")]
    pub time: NaiveDateTime,
}

impl QuantityRecord {
    /// Builds the record for a stock entry whose warehouse is known
    pub fn from_stock(stock: &StockEntry, observed_at: DateTime<Utc>) -> Self {
        Self {
            product_id: stock.product_id,
            option_id: stock.option_id,
            store_id: stock.warehouse_id,
            quantity: stock.quantity,
            date: observed_at.date_naive(),
            time: observed_at.naive_utc(),
        }
    }
}

/// One `(product, size option, warehouse)` stock tuple as found in a
/// product-detail response, before warehouse resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockEntry {
    pub product_id: u64,
    pub option_id: u64,
    pub warehouse_id: u32,
    pub quantity: u32,
}

/// A stock-holding location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warehouse {
    pub id: u32,
    pub name: Option<String>,
}

/// A catalog category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub id: u32,
    pub name: String,
    pub parent_id: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 7, 21, 4).unwrap()
    }

    #[test]
    fn test_brand_serializes_like_downstream_table() {
        let brand = Brand::new(42, "Acme", fixed_time());
        let value = serde_json::to_value(&brand).unwrap();

        assert_eq!(value["id"], 42);
        assert_eq!(value["name"], "Acme");
        assert_eq!(value["created_at"], "2025-05-06");
        assert_eq!(value["updated_at"], "2025-05-06 07:21:04");
    }

    #[test]
    fn test_product_optional_fields_serialize_as_null() {
        let product = Product {
            id: 1,
            name: "Shirt".to_string(),
            seller_id: 0,
            brand_id: 7,
            subject_id: 3,
            root: None,
            kind_id: Some(2),
            subject_parent_id: None,
            match_id: None,
            created_at: fixed_time().date_naive(),
            updated_at: fixed_time().naive_utc(),
        };
        let value = serde_json::to_value(&product).unwrap();

        assert_eq!(value["brand_id"], 7);
        assert_eq!(value["kind_id"], 2);
        assert!(value["root"].is_null());
        assert!(value["match_id"].is_null());
        assert_eq!(value["created_at"], "2025-05-06");
        assert_eq!(value["updated_at"], "2025-05-06 07:21:04");
    }

    #[test]
    fn test_quantity_from_stock() {
        let stock = StockEntry {
            product_id: 10,
            option_id: 20,
            warehouse_id: 507,
            quantity: 3,
        };
        let record = QuantityRecord::from_stock(&stock, fixed_time());
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["store_id"], 507);
        assert_eq!(value["quantity"], 3);
        assert_eq!(value["date"], "2025-05-06");
        assert_eq!(value["time"], "2025-05-06 07:21:04");
    }
}
