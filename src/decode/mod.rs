//! Response decoding
//!
//! Maps raw marketplace JSON into typed entities. Marketplace responses are
//! schema-unstable, so every decoder works element by element: a malformed
//! element is logged at debug level and excluded, and the rest of the
//! collection is still returned. Decoders never fail as a whole.

mod fields;

use crate::model::{Brand, Product, StockEntry, Subject, Warehouse};
use chrono::{DateTime, Utc};
use fields::{as_object, collection, optional_id, optional_str, required_id, required_name, root_or_data};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Why a single element could not be decoded
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("element is not a JSON object")]
    NotAnObject,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has an invalid value: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Decodes the brand-list response (`value.brandsList[]`)
///
/// Every brand is stamped with `seen_at` as its creation and update time.
pub fn decode_brands(root: &Value, seen_at: DateTime<Utc>) -> Vec<Brand> {
    collection(root, "/value/brandsList")
        .iter()
        .filter_map(|element| keep("brand", decode_brand(element, seen_at)))
        .collect()
}

fn decode_brand(element: &Value, seen_at: DateTime<Utc>) -> Result<Brand, DecodeError> {
    let object = as_object(element)?;
    let id = required_id(object, "id")?;
    let name = required_name(object, "name")?;
    Ok(Brand::new(id, name, seen_at))
}

/// Decodes one catalog page (`data.products[]`) for `brand_id`
///
/// `id` and `name` are required. `sellerId` and `subjectId` default to 0;
/// the remaining numeric fields become `None` when absent or malformed.
/// Every product is stamped with `seen_at`.
pub fn decode_products(root: &Value, brand_id: u32, seen_at: DateTime<Utc>) -> Vec<Product> {
    collection(root, "/data/products")
        .iter()
        .filter_map(|element| keep("product", decode_product(element, brand_id, seen_at)))
        .collect()
}

fn decode_product(
    element: &Value,
    brand_id: u32,
    seen_at: DateTime<Utc>,
) -> Result<Product, DecodeError> {
    let object = as_object(element)?;

    Ok(Product {
        id: required_id(object, "id")?,
        name: required_name(object, "name")?,
        seller_id: optional_id(object, "sellerId").unwrap_or(0),
        brand_id,
        subject_id: optional_id(object, "subjectId").unwrap_or(0),
        root: optional_id(object, "root"),
        kind_id: optional_id(object, "kindId"),
        subject_parent_id: optional_id(object, "subjectParentId"),
        match_id: optional_id(object, "matchId"),
        created_at: seen_at.date_naive(),
        updated_at: seen_at.naive_utc(),
    })
}

/// Flattens a product-detail response into stock tuples
///
/// Walks `data.products[].sizes[].stocks[]` and yields one entry per
/// `(product, size option, warehouse)`. A malformed product, size or stock
/// only excludes itself.
pub fn decode_stocks(root: &Value) -> Vec<StockEntry> {
    let mut entries = Vec::new();

    for product in collection(root, "/data/products") {
        let Some(product_id) = keep("detail product", product_id(product)) else {
            continue;
        };

        for size in collection(product, "/sizes") {
            let Some(option_id) = keep("size", option_id(size)) else {
                continue;
            };

            for stock in collection(size, "/stocks") {
                let entry = decode_stock(stock, product_id, option_id);
                if let Some(entry) = keep("stock", entry) {
                    entries.push(entry);
                }
            }
        }
    }

    entries
}

fn product_id(element: &Value) -> Result<u64, DecodeError> {
    required_id(as_object(element)?, "id")
}

fn option_id(element: &Value) -> Result<u64, DecodeError> {
    required_id(as_object(element)?, "optionId")
}

fn decode_stock(element: &Value, product_id: u64, option_id: u64) -> Result<StockEntry, DecodeError> {
    let object = as_object(element)?;

    Ok(StockEntry {
        product_id,
        option_id,
        warehouse_id: required_id(object, "wh")?,
        quantity: required_id(object, "qty")?,
    })
}

/// Decodes the warehouse list into a map keyed by warehouse id
pub fn decode_warehouses(root: &Value) -> HashMap<u32, Warehouse> {
    root_or_data(root)
        .iter()
        .filter_map(|element| keep("warehouse", decode_warehouse(element)))
        .map(|warehouse| (warehouse.id, warehouse))
        .collect()
}

fn decode_warehouse(element: &Value) -> Result<Warehouse, DecodeError> {
    let object = as_object(element)?;

    Ok(Warehouse {
        id: required_id(object, "id")?,
        name: optional_str(object, "name"),
    })
}

/// Decodes the category list
pub fn decode_subjects(root: &Value) -> Vec<Subject> {
    root_or_data(root)
        .iter()
        .filter_map(|element| keep("subject", decode_subject(element)))
        .collect()
}

fn decode_subject(element: &Value) -> Result<Subject, DecodeError> {
    let object = as_object(element)?;

    Ok(Subject {
        id: required_id(object, "id")?,
        name: required_name(object, "name")?,
        parent_id: optional_id(object, "parent").or_else(|| optional_id(object, "parentId")),
    })
}

fn keep<T>(kind: &str, result: Result<T, DecodeError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Skipping malformed {}: {}", kind, e);
            None
        }
    }
}
