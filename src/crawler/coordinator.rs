//! Crawl orchestration
//!
//! Sequences the three phases of a crawl and wires decoded entities to the
//! sink:
//! 1. Brand discovery, letter by letter with a fixed delay
//! 2. Product pagination through the `PaginatedFetchScheduler`
//! 3. Stock extraction in product-id batches, resolved against the
//!    warehouse map

use crate::api::{MarketplaceApi, RetryingHttpClient};
use crate::config::{Config, CrawlerConfig, MAX_DETAIL_BATCH};
use crate::crawler::progress::{EntityKind, ProgressObserver};
use crate::crawler::scheduler::{PaginatedFetchScheduler, PaginationReport};
use crate::crawler::until_deadline;
use crate::crawler::warehouses::WarehouseCache;
use crate::decode::{decode_brands, decode_stocks};
use crate::model::{Brand, QuantityRecord};
use crate::output::RunReport;
use crate::sink::PublishSink;
use crate::storage::BrandStore;
use crate::CrawlError;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Result of brand discovery
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    /// Distinct brands in discovery order
    pub brands: Vec<Brand>,
    pub letters: usize,
    pub published: u64,
    pub publish_failures: u64,
}

impl DiscoveryReport {
    /// Ids of the discovered brands
    pub fn brand_ids(&self) -> Vec<u32> {
        self.brands.iter().map(|brand| brand.id).collect()
    }
}

/// Result of stock extraction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuantityReport {
    pub batches: u64,
    pub batches_failed: u64,
    pub published: u64,
    pub publish_failures: u64,
    /// Stock entries dropped because their warehouse is unknown
    pub stocks_skipped: u64,
}

impl QuantityReport {
    fn absorb(&mut self, batch: QuantityReport) {
        self.batches += batch.batches;
        self.batches_failed += batch.batches_failed;
        self.published += batch.published;
        self.publish_failures += batch.publish_failures;
        self.stocks_skipped += batch.stocks_skipped;
    }

    fn failed_batch() -> Self {
        Self {
            batches: 1,
            batches_failed: 1,
            ..Self::default()
        }
    }
}

/// Drives a crawl from brand discovery to stock quantities
pub struct CrawlOrchestrator {
    api: Arc<MarketplaceApi>,
    sink: Arc<dyn PublishSink>,
    settings: CrawlerConfig,
    warehouses: WarehouseCache,
    observer: Option<Arc<dyn ProgressObserver>>,
    registry: Option<Mutex<Box<dyn BrandStore + Send>>>,
    deadline: Option<Instant>,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator
    ///
    /// The run deadline, if configured, starts counting now.
    ///
    /// # Arguments
    ///
    /// * `api` - Marketplace access
    /// * `sink` - Destination of every published entity
    /// * `settings` - Delays, concurrency and batch sizes
    pub fn new(api: Arc<MarketplaceApi>, sink: Arc<dyn PublishSink>, settings: CrawlerConfig) -> Self {
        let deadline = settings
            .run_timeout_secs
            .map(|secs| Instant::now() + Duration::from_secs(secs));

        Self {
            api,
            sink,
            settings,
            warehouses: WarehouseCache::new(),
            observer: None,
            registry: None,
            deadline,
        }
    }

    /// Builds the HTTP client and endpoint catalog from the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOrchestrator)` - Ready to crawl
    /// * `Err(CrawlError)` - The HTTP client or an endpoint URL is invalid
    pub fn from_config(config: &Config, sink: Arc<dyn PublishSink>) -> Result<Self, CrawlError> {
        let client = RetryingHttpClient::new(&config.http)?;
        let api = MarketplaceApi::new(Arc::new(client), &config.endpoints)?;
        Ok(Self::new(Arc::new(api), sink, config.crawler.clone()))
    }

    /// Reports every published entity to `observer`
    pub fn with_observer<O: ProgressObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Persists discovered brands into `registry`
    pub fn with_registry<S: BrandStore + Send + 'static>(mut self, registry: S) -> Self {
        self.registry = Some(Mutex::new(Box::new(registry)));
        self
    }

    /// Uses the given warehouse cache instead of an empty one
    pub fn with_warehouses(mut self, warehouses: WarehouseCache) -> Self {
        self.warehouses = warehouses;
        self
    }

    /// Marketplace access used by this orchestrator
    pub fn api(&self) -> &MarketplaceApi {
        &self.api
    }

    /// Phase 1: discovers and publishes brands letter by letter
    ///
    /// Letters are fetched sequentially with `request-delay-ms` between
    /// them. Brands repeated across letters are published once. Any letter
    /// failing after retries aborts discovery; brands of the letters before
    /// it are already published and stored.
    pub async fn discover_brands(&self, letters: &[String]) -> Result<DiscoveryReport, CrawlError> {
        let mut report = DiscoveryReport {
            letters: letters.len(),
            ..DiscoveryReport::default()
        };
        let mut seen = HashSet::new();
        let delay = Duration::from_millis(self.settings.request_delay_ms);

        tracing::info!("Discovering brands for {} letters", letters.len());

        for (index, letter) in letters.iter().enumerate() {
            if index > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let value = self
                .api
                .brands_by_letter(letter)
                .await
                .map_err(|source| CrawlError::Discovery {
                    letter: letter.clone(),
                    source,
                })?;

            let brands = decode_brands(&value, Utc::now());
            tracing::debug!("Letter '{}': {} brands", letter, brands.len());
            let first_new = report.brands.len();

            for brand in brands {
                if !seen.insert(brand.id) {
                    continue;
                }

                match self.sink.send_brand(&brand).await {
                    Ok(()) => {
                        report.published += 1;
                        self.notify(EntityKind::Brand);
                    }
                    Err(e) => {
                        report.publish_failures += 1;
                        tracing::warn!("Failed to publish brand {}: {}", brand.id, e);
                    }
                }
                report.brands.push(brand);
            }

            let new_brands = &report.brands[first_new..];
            match &self.registry {
                Some(registry) if !new_brands.is_empty() => {
                    let stored = registry.lock().await.upsert_brands(new_brands)?;
                    tracing::debug!("Letter '{}': stored {} brands in the registry", letter, stored);
                }
                _ => {}
            }
        }

        tracing::info!(
            "Discovered {} brands, published {}",
            report.brands.len(),
            report.published
        );

        Ok(report)
    }

    /// Phase 2: paginates and publishes every product of `brand_ids`
    pub async fn paginate_products(&self, brand_ids: &[u32]) -> PaginationReport {
        PaginatedFetchScheduler::new(
            Arc::clone(&self.api),
            Arc::clone(&self.sink),
            self.settings.concurrency,
        )
        .with_observer(self.observer.clone())
        .with_deadline(self.deadline)
        .run(brand_ids)
        .await
    }

    /// Phase 3: publishes the stock quantities of `product_ids`
    ///
    /// Ids are deduplicated and split into batches of `chunk-size` (never
    /// more than 500). Up to `detail-concurrency` batches run at once. A
    /// failed batch is logged and skipped.
    pub async fn extract_quantities(&self, product_ids: &[u64]) -> QuantityReport {
        let mut seen = HashSet::new();
        let ids: Vec<u64> = product_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let chunk_size = self.settings.chunk_size.clamp(1, MAX_DETAIL_BATCH);
        let parallel = self.settings.detail_concurrency.max(1);

        tracing::info!(
            "Extracting quantities for {} products in batches of {}",
            ids.len(),
            chunk_size
        );

        let report = stream::iter(ids.chunks(chunk_size))
            .map(|batch| self.extract_batch(batch))
            .buffer_unordered(parallel)
            .fold(QuantityReport::default(), |mut report, batch| async move {
                report.absorb(batch);
                report
            })
            .await;

        tracing::info!(
            "Quantity extraction finished: {} batches ({} failed), {} records published, {} stocks skipped",
            report.batches,
            report.batches_failed,
            report.published,
            report.stocks_skipped
        );

        report
    }

    async fn extract_batch(&self, batch: &[u64]) -> QuantityReport {
        if self.deadline_passed() {
            tracing::warn!("Run deadline reached, skipping batch of {} products", batch.len());
            return QuantityReport::failed_batch();
        }

        let warehouses = match until_deadline(self.deadline, self.warehouses.get(&self.api)).await {
            Some(Ok(warehouses)) => warehouses,
            Some(Err(e)) => {
                tracing::warn!("Skipping batch of {} products, no warehouse list: {}", batch.len(), e);
                return QuantityReport::failed_batch();
            }
            None => return QuantityReport::failed_batch(),
        };

        let details = match until_deadline(self.deadline, self.api.product_details(batch)).await {
            Some(Ok(details)) => details,
            Some(Err(e)) => {
                tracing::warn!("Skipping batch of {} products: {}", batch.len(), e);
                return QuantityReport::failed_batch();
            }
            None => {
                tracing::warn!("Detail batch aborted at the run deadline");
                return QuantityReport::failed_batch();
            }
        };

        let mut report = QuantityReport {
            batches: 1,
            ..QuantityReport::default()
        };
        let observed_at = Utc::now();

        for stock in decode_stocks(&details) {
            if !warehouses.contains_key(&stock.warehouse_id) {
                tracing::warn!(
                    "Unknown warehouse {} for product {} option {}, skipping",
                    stock.warehouse_id,
                    stock.product_id,
                    stock.option_id
                );
                report.stocks_skipped += 1;
                continue;
            }

            let record = QuantityRecord::from_stock(&stock, observed_at);
            match self.sink.send_quantity(&record).await {
                Ok(()) => {
                    report.published += 1;
                    self.notify(EntityKind::Quantity);
                }
                Err(e) => {
                    report.publish_failures += 1;
                    tracing::warn!(
                        "Failed to publish quantity of product {} in warehouse {}: {}",
                        record.product_id,
                        record.store_id,
                        e
                    );
                }
            }
        }

        let delay = Duration::from_millis(self.settings.request_delay_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        report
    }

    /// Phases 2 and 3 for the given brands
    pub async fn crawl_products(&self, brand_ids: &[u32]) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::default();

        let pagination = self.paginate_products(brand_ids).await;
        let quantities = self.extract_quantities(&pagination.product_ids).await;

        report.record_pagination(&pagination);
        report.record_quantities(&quantities);
        report.duration = started.elapsed();
        report
    }

    /// All three phases, starting from the letter list
    ///
    /// Fails only when brand discovery fails; page and batch failures are
    /// counted in the report.
    pub async fn run_full(&self, letters: &[String]) -> Result<RunReport, CrawlError> {
        let started = Instant::now();

        let discovery = self.discover_brands(letters).await?;
        let mut report = self.crawl_products(&discovery.brand_ids()).await;

        report.record_discovery(&discovery);
        report.duration = started.elapsed();
        Ok(report)
    }

    fn notify(&self, kind: EntityKind) {
        if let Some(observer) = &self.observer {
            observer.on_published(kind);
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}
