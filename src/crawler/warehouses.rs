//! Lazily loaded warehouse map

use crate::api::{MarketplaceApi, TransportError};
use crate::decode::decode_warehouses;
use crate::model::Warehouse;
use std::collections::HashMap;
use tokio::sync::OnceCell;

/// Warehouse map fetched once from the stores endpoint
///
/// Concurrent first accesses share a single fetch. A failed fetch is not
/// cached, so the next access tries again.
#[derive(Debug, Default)]
pub struct WarehouseCache {
    cell: OnceCell<HashMap<u32, Warehouse>>,
}

impl WarehouseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache that is already populated
    pub fn preloaded(warehouses: HashMap<u32, Warehouse>) -> Self {
        Self {
            cell: OnceCell::new_with(Some(warehouses)),
        }
    }

    /// Returns the warehouse map, fetching it on first use
    pub async fn get(&self, api: &MarketplaceApi) -> Result<&HashMap<u32, Warehouse>, TransportError> {
        self.cell
            .get_or_try_init(|| async {
                let value = api.stores().await?;
                let warehouses = decode_warehouses(&value);
                tracing::info!("Loaded {} warehouses", warehouses.len());
                Ok(warehouses)
            })
            .await
    }

    /// Whether the map has been loaded
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }
}
