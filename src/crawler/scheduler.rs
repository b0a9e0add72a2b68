//! Bounded-concurrency pagination over brand catalogs
//!
//! This module handles:
//! - Seeding one crawl line per brand at page 1
//! - Keeping up to `concurrency` page fetches in flight
//! - Generating the next page only from a full page's completion
//! - Ending each brand's line independently on a short, empty or failed page
//! - Publishing fetched pages outside the fetch window
//! - Aborting in-flight fetches and dropping queued work at the run deadline

use crate::api::{MarketplaceApi, TransportError};
use crate::crawler::progress::{EntityKind, ProgressObserver};
use crate::crawler::until_deadline;
use crate::decode::decode_products;
use crate::model::Product;
use crate::sink::PublishSink;
use chrono::Utc;
use futures::FutureExt;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Number of products the catalog returns for a full page
///
/// A page with exactly this many products means another page may follow.
pub const PAGE_SIZE: usize = 100;

/// One page of one brand's catalog, the unit of concurrent scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FetchTask {
    pub brand_id: u32,
    pub page: u32,
}

impl FetchTask {
    fn first(brand_id: u32) -> Self {
        Self { brand_id, page: 1 }
    }

    fn next(self) -> Self {
        Self {
            brand_id: self.brand_id,
            page: self.page + 1,
        }
    }
}

/// How a brand's crawl line ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Pages are still queued or in flight
    Active,
    /// A short or empty page was observed
    Exhausted,
    /// A page fetch failed; later pages were never requested
    Truncated,
    /// The run deadline passed before the line ended
    Cancelled,
}

/// Pagination state of one brand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlCursor {
    /// Next page to request; advances only on a full page
    pub next_page: u32,
    pub pages_fetched: u32,
    pub products: u64,
    pub outcome: LineOutcome,
}

impl Default for CrawlCursor {
    fn default() -> Self {
        Self {
            next_page: 1,
            pages_fetched: 0,
            products: 0,
            outcome: LineOutcome::Active,
        }
    }
}

/// Totals of one pagination run
#[derive(Debug, Clone, Default)]
pub struct PaginationReport {
    pub pages_fetched: u64,
    pub pages_failed: u64,
    pub products_published: u64,
    pub publish_failures: u64,
    /// Ids of every decoded product, in completion order
    pub product_ids: Vec<u64>,
    /// Final cursor of every seeded brand
    pub lines: HashMap<u32, CrawlCursor>,
}

impl PaginationReport {
    /// Products decoded for one brand
    pub fn products_for(&self, brand_id: u32) -> u64 {
        self.lines.get(&brand_id).map_or(0, |cursor| cursor.products)
    }
}

enum PageFailure {
    Transport(TransportError),
    DeadlineElapsed,
    Panicked,
}

/// Publish results of one page
#[derive(Debug, Default, Clone, Copy)]
struct PublishTally {
    published: u64,
    failures: u64,
}

/// Fetches every page of a set of brands with bounded concurrency
///
/// Pages are not known upfront. Page `k` of a brand is only enqueued from
/// the completion of page `k - 1`, so at most one page per brand is in
/// flight and cursor updates need no locking: they all happen on the
/// scheduler's own loop.
///
/// Only fetches occupy the concurrency window. A fetched page is handed to
/// its own publish task, so a slow sink never keeps the window from
/// refilling.
pub struct PaginatedFetchScheduler {
    api: Arc<MarketplaceApi>,
    sink: Arc<dyn PublishSink>,
    observer: Option<Arc<dyn ProgressObserver>>,
    concurrency: usize,
    deadline: Option<Instant>,
}

impl PaginatedFetchScheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    ///
    /// * `api` - Marketplace access used for the catalog pages
    /// * `sink` - Destination of every decoded product
    /// * `concurrency` - Maximum number of page fetches in flight, at least 1
    pub fn new(api: Arc<MarketplaceApi>, sink: Arc<dyn PublishSink>, concurrency: usize) -> Self {
        Self {
            api,
            sink,
            observer: None,
            concurrency: concurrency.max(1),
            deadline: None,
        }
    }

    /// Reports every published product to `observer`
    pub fn with_observer(mut self, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        self.observer = observer;
        self
    }

    /// Stops the run at `deadline`
    ///
    /// Fetches still running at the deadline count as failed pages; queued
    /// pages are dropped. Pages already fetched are still published.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Crawls every page of every brand in `brand_ids`
    ///
    /// Duplicate brand ids are crawled once. Failed pages are logged and end
    /// their brand's line without affecting other brands.
    pub async fn run(&self, brand_ids: &[u32]) -> PaginationReport {
        let mut report = PaginationReport::default();
        let mut queue = VecDeque::new();

        for &brand_id in brand_ids {
            if report.lines.insert(brand_id, CrawlCursor::default()).is_none() {
                queue.push_back(FetchTask::first(brand_id));
            }
        }

        tracing::info!(
            "Paginating {} brands with concurrency {}",
            queue.len(),
            self.concurrency
        );

        let mut in_flight: HashSet<FetchTask> = HashSet::new();
        let mut fetches = JoinSet::new();
        let mut publishes = JoinSet::new();

        loop {
            if self.deadline_passed() && !queue.is_empty() {
                tracing::warn!(
                    "Run deadline reached, dropping {} queued page(s)",
                    queue.len()
                );
                for task in queue.drain(..) {
                    if let Some(cursor) = report.lines.get_mut(&task.brand_id) {
                        cursor.outcome = LineOutcome::Cancelled;
                    }
                }
            }

            while fetches.len() < self.concurrency {
                let Some(task) = queue.pop_front() else {
                    break;
                };

                if !in_flight.insert(task) {
                    tracing::debug!(
                        "Page {} of brand {} is already in flight",
                        task.page,
                        task.brand_id
                    );
                    continue;
                }

                let api = Arc::clone(&self.api);
                let deadline = self.deadline;
                fetches.spawn(async move {
                    let result = AssertUnwindSafe(fetch_page(&api, task, deadline))
                        .catch_unwind()
                        .await
                        .unwrap_or(Err(PageFailure::Panicked));
                    (task, result)
                });
            }

            if fetches.is_empty() && publishes.is_empty() {
                break;
            }

            tokio::select! {
                Some(joined) = fetches.join_next(), if !fetches.is_empty() => match joined {
                    Ok((task, result)) => {
                        in_flight.remove(&task);
                        if let Some(products) = self.complete(task, result, &mut queue, &mut report) {
                            let sink = Arc::clone(&self.sink);
                            let observer = self.observer.clone();
                            publishes.spawn(publish_page(sink, observer, products));
                        }
                    }
                    Err(e) => {
                        // Panics are caught inside the task; only cancellation lands here
                        tracing::error!("Page fetch task failed: {}", e);
                        report.pages_failed += 1;
                    }
                },
                Some(joined) = publishes.join_next(), if !publishes.is_empty() => match joined {
                    Ok(tally) => {
                        report.products_published += tally.published;
                        report.publish_failures += tally.failures;
                    }
                    Err(e) => tracing::error!("Product publish task failed: {}", e),
                },
            }
        }

        tracing::info!(
            "Pagination finished: {} pages fetched, {} failed, {} products published",
            report.pages_fetched,
            report.pages_failed,
            report.products_published
        );

        report
    }

    /// Updates the brand's cursor from a finished fetch
    ///
    /// Returns the products to publish when the page was fetched.
    fn complete(
        &self,
        task: FetchTask,
        result: Result<Vec<Product>, PageFailure>,
        queue: &mut VecDeque<FetchTask>,
        report: &mut PaginationReport,
    ) -> Option<Vec<Product>> {
        let products = match result {
            Ok(products) => products,
            Err(failure) => {
                report.pages_failed += 1;
                let outcome = match failure {
                    PageFailure::Transport(e) => {
                        tracing::warn!(
                            "Dropping page {} of brand {}: {}",
                            task.page,
                            task.brand_id,
                            e
                        );
                        LineOutcome::Truncated
                    }
                    PageFailure::Panicked => {
                        tracing::error!(
                            "Fetch of page {} of brand {} panicked",
                            task.page,
                            task.brand_id
                        );
                        LineOutcome::Truncated
                    }
                    PageFailure::DeadlineElapsed => {
                        tracing::warn!(
                            "Page {} of brand {} aborted at the run deadline",
                            task.page,
                            task.brand_id
                        );
                        LineOutcome::Cancelled
                    }
                };
                if let Some(cursor) = report.lines.get_mut(&task.brand_id) {
                    cursor.outcome = outcome;
                }
                return None;
            }
        };

        report.pages_fetched += 1;
        report.product_ids.extend(products.iter().map(|product| product.id));

        let cursor = report.lines.entry(task.brand_id).or_default();
        cursor.pages_fetched += 1;
        cursor.products += products.len() as u64;

        if products.len() == PAGE_SIZE {
            let next = task.next();
            cursor.next_page = next.page;
            queue.push_back(next);
        } else {
            cursor.outcome = LineOutcome::Exhausted;
            tracing::debug!(
                "Brand {} exhausted at page {} ({} products)",
                task.brand_id,
                task.page,
                products.len()
            );
        }

        Some(products)
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

async fn fetch_page(
    api: &MarketplaceApi,
    task: FetchTask,
    deadline: Option<Instant>,
) -> Result<Vec<Product>, PageFailure> {
    match until_deadline(deadline, api.products_by_brand(task.brand_id, task.page)).await {
        Some(Ok(value)) => Ok(decode_products(&value, task.brand_id, Utc::now())),
        Some(Err(e)) => Err(PageFailure::Transport(e)),
        None => Err(PageFailure::DeadlineElapsed),
    }
}

async fn publish_page(
    sink: Arc<dyn PublishSink>,
    observer: Option<Arc<dyn ProgressObserver>>,
    products: Vec<Product>,
) -> PublishTally {
    let mut tally = PublishTally::default();

    for product in &products {
        match sink.send_product(product).await {
            Ok(()) => {
                tally.published += 1;
                if let Some(observer) = &observer {
                    observer.on_published(EntityKind::Product);
                }
            }
            Err(e) => {
                tally.failures += 1;
                tracing::warn!("Failed to publish product {}: {}", product.id, e);
            }
        }
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_task_same_brand() {
        let task = FetchTask::first(9);
        assert_eq!(task.page, 1);
        assert_eq!(task.next(), FetchTask { brand_id: 9, page: 2 });
    }

    #[test]
    fn test_cursor_starts_at_first_page() {
        let cursor = CrawlCursor::default();
        assert_eq!(cursor.next_page, 1);
        assert_eq!(cursor.outcome, LineOutcome::Active);
    }

    #[test]
    fn test_products_for_unknown_brand() {
        let report = PaginationReport::default();
        assert_eq!(report.products_for(1), 0);
    }
}
