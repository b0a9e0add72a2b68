//! Crawler module for catalog ingestion
//!
//! This module contains the core crawling logic, including:
//! - Bounded-concurrency pagination with dynamically generated pages
//! - The lazily loaded warehouse map
//! - Progress observation
//! - Overall crawl orchestration

mod coordinator;
mod progress;
mod scheduler;
mod warehouses;

pub use coordinator::{CrawlOrchestrator, DiscoveryReport, QuantityReport};
pub use progress::{EntityKind, ProgressObserver};
pub use scheduler::{
    CrawlCursor, FetchTask, LineOutcome, PaginatedFetchScheduler, PaginationReport, PAGE_SIZE,
};
pub use warehouses::WarehouseCache;

use std::future::Future;
use tokio::time::Instant;

/// Runs `future` until `deadline`
///
/// Returns `None` if the deadline passed first; the future is dropped,
/// which aborts any request it had in flight.
pub(crate) async fn until_deadline<F: Future>(
    deadline: Option<Instant>,
    future: F,
) -> Option<F::Output> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_until_deadline_without_deadline() {
        assert_eq!(until_deadline(None, async { 5 }).await, Some(5));
    }

    #[tokio::test]
    async fn test_until_deadline_elapsed() {
        let deadline = Instant::now() + Duration::from_millis(10);
        let slow = tokio::time::sleep(Duration::from_secs(5));
        assert!(until_deadline(Some(deadline), slow).await.is_none());
    }
}
