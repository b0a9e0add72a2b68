//! Run report and its console rendering

use crate::crawler::{DiscoveryReport, LineOutcome, PaginationReport, QuantityReport};
use std::io::{self, Write};
use std::time::Duration;

/// Totals of a crawl run
///
/// A run that lost pages or batches is still a successful run with smaller
/// counts; only a failed discovery makes a run fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    // Published entities
    pub brands_published: u64,
    pub products_published: u64,
    pub quantities_published: u64,

    // Pagination
    pub brands_crawled: u64,
    pub brands_truncated: u64,
    pub pages_fetched: u64,
    pub pages_failed: u64,

    // Stock extraction
    pub detail_batches: u64,
    pub detail_batches_failed: u64,
    pub stocks_skipped: u64,

    pub publish_failures: u64,
    pub duration: Duration,
}

impl RunReport {
    /// Creates an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entities published across all phases
    pub fn processed_entities(&self) -> u64 {
        self.brands_published + self.products_published + self.quantities_published
    }

    /// Adds the result of brand discovery
    pub fn record_discovery(&mut self, discovery: &DiscoveryReport) {
        self.brands_published += discovery.published;
        self.publish_failures += discovery.publish_failures;
    }

    /// Adds the result of product pagination
    pub fn record_pagination(&mut self, pagination: &PaginationReport) {
        self.products_published += pagination.products_published;
        self.publish_failures += pagination.publish_failures;
        self.pages_fetched += pagination.pages_fetched;
        self.pages_failed += pagination.pages_failed;
        self.brands_crawled += pagination.lines.len() as u64;
        self.brands_truncated += pagination
            .lines
            .values()
            .filter(|cursor| cursor.outcome != LineOutcome::Exhausted)
            .count() as u64;
    }

    /// Adds the result of stock extraction
    pub fn record_quantities(&mut self, quantities: &QuantityReport) {
        self.quantities_published += quantities.published;
        self.publish_failures += quantities.publish_failures;
        self.detail_batches += quantities.batches;
        self.detail_batches_failed += quantities.batches_failed;
        self.stocks_skipped += quantities.stocks_skipped;
    }

    /// Adds another report, e.g. the next batch of brands
    pub fn merge(&mut self, other: &RunReport) {
        self.brands_published += other.brands_published;
        self.products_published += other.products_published;
        self.quantities_published += other.quantities_published;
        self.brands_crawled += other.brands_crawled;
        self.brands_truncated += other.brands_truncated;
        self.pages_fetched += other.pages_fetched;
        self.pages_failed += other.pages_failed;
        self.detail_batches += other.detail_batches;
        self.detail_batches_failed += other.detail_batches_failed;
        self.stocks_skipped += other.stocks_skipped;
        self.publish_failures += other.publish_failures;
        self.duration += other.duration;
    }
}

/// Writes the report in the console layout
pub fn write_report<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    writeln!(out, "=== Crawl Report ===\n")?;

    writeln!(out, "Published:")?;
    writeln!(out, "  Brands: {}", report.brands_published)?;
    writeln!(out, "  Products: {}", report.products_published)?;
    writeln!(out, "  Quantities: {}", report.quantities_published)?;
    writeln!(out)?;

    if report.brands_crawled > 0 {
        writeln!(out, "Pagination:")?;
        writeln!(out, "  Brands crawled: {}", report.brands_crawled)?;
        writeln!(out, "  Pages fetched: {}", report.pages_fetched)?;
        writeln!(out, "  Pages failed: {}", report.pages_failed)?;
        if report.brands_truncated > 0 {
            writeln!(out, "  Brands not fully crawled: {}", report.brands_truncated)?;
        }
        writeln!(out)?;
    }

    if report.detail_batches > 0 {
        writeln!(out, "Quantities:")?;
        writeln!(out, "  Detail batches: {}", report.detail_batches)?;
        writeln!(out, "  Batches failed: {}", report.detail_batches_failed)?;
        writeln!(out, "  Unknown-warehouse stocks skipped: {}", report.stocks_skipped)?;
        writeln!(out)?;
    }

    if report.publish_failures > 0 {
        writeln!(out, "Publish failures: {}", report.publish_failures)?;
    }

    writeln!(
        out,
        "Processed {} entities in {:.1}s",
        report.processed_entities(),
        report.duration.as_secs_f64()
    )
}

/// Prints the report to stdout
pub fn print_report(report: &RunReport) {
    let stdout = io::stdout();
    if let Err(e) = write_report(&mut stdout.lock(), report) {
        tracing::warn!("Failed to print report: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlCursor;

    #[test]
    fn test_processed_entities() {
        let report = RunReport {
            brands_published: 2,
            products_published: 140,
            quantities_published: 30,
            ..RunReport::new()
        };
        assert_eq!(report.processed_entities(), 172);
    }

    #[test]
    fn test_record_pagination_counts_unfinished_lines() {
        let mut pagination = PaginationReport {
            pages_fetched: 3,
            pages_failed: 1,
            products_published: 140,
            ..PaginationReport::default()
        };
        pagination.lines.insert(
            1,
            CrawlCursor {
                outcome: LineOutcome::Exhausted,
                ..CrawlCursor::default()
            },
        );
        pagination.lines.insert(
            2,
            CrawlCursor {
                outcome: LineOutcome::Truncated,
                ..CrawlCursor::default()
            },
        );

        let mut report = RunReport::new();
        report.record_pagination(&pagination);

        assert_eq!(report.brands_crawled, 2);
        assert_eq!(report.brands_truncated, 1);
        assert_eq!(report.pages_failed, 1);
        assert_eq!(report.products_published, 140);
    }

    #[test]
    fn test_merge_adds_up() {
        let mut total = RunReport {
            products_published: 10,
            duration: Duration::from_secs(1),
            ..RunReport::new()
        };
        total.merge(&RunReport {
            products_published: 5,
            quantities_published: 2,
            duration: Duration::from_secs(2),
            ..RunReport::new()
        });

        assert_eq!(total.products_published, 15);
        assert_eq!(total.quantities_published, 2);
        assert_eq!(total.duration, Duration::from_secs(3));
    }

    #[test]
    fn test_write_report() {
        let report = RunReport {
            brands_published: 1,
            products_published: 4,
            brands_crawled: 1,
            pages_fetched: 1,
            ..RunReport::new()
        };
        let mut out = Vec::new();
        write_report(&mut out, &report).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Products: 4"));
        assert!(text.contains("Pages fetched: 1"));
        assert!(text.contains("Processed 5 entities"));
        assert!(!text.contains("Quantities:"));
    }
}
