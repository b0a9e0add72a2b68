//! Publishing decoded entities
//!
//! This module provides:
//! - The `PublishSink` contract every destination implements
//! - A file sink for offline and dry-run mode
//! - A broker sink that publishes through a Kafka REST proxy
//! - `with_sink`, which guarantees a sink is closed exactly once

mod broker;
mod file;

pub use broker::BrokerSink;
pub use file::FileSink;

use crate::api::RetryPolicy;
use crate::config::{HttpConfig, SinkConfig};
use crate::model::{Brand, Product, QuantityRecord};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised while publishing a record
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink is closed")]
    Closed,

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("Publishing to topic '{topic}' failed after {attempts} attempt(s): {message}")]
    Broker {
        topic: String,
        attempts: u32,
        message: String,
    },
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for decoded entities
///
/// Implementations are shared across concurrent fetch tasks, so every method
/// takes `&self`. Sends after `close` fail with `SinkError::Closed`; closing
/// twice is a no-op.
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Publishes one brand
    async fn send_brand(&self, brand: &Brand) -> SinkResult<()>;

    /// Publishes one product
    async fn send_product(&self, product: &Product) -> SinkResult<()>;

    /// Publishes one stock quantity
    async fn send_quantity(&self, record: &QuantityRecord) -> SinkResult<()>;

    /// Flushes pending output and releases the destination
    async fn close(&self) -> SinkResult<()>;
}

/// Builds the sink selected by the configuration
///
/// # Arguments
///
/// * `sink` - Sink selection and targets
/// * `http` - Used for the broker sink's user agent, timeout and retries
///
/// # Returns
///
/// * `Ok(Arc<dyn PublishSink>)` - The file sink when `mock` is set, otherwise the broker sink
/// * `Err(SinkError)` - The output files or the HTTP client could not be created
pub fn build_sink(sink: &SinkConfig, http: &HttpConfig) -> SinkResult<Arc<dyn PublishSink>> {
    if sink.mock {
        tracing::info!(
            "Publishing to files in {}",
            sink.file.output_dir.display()
        );
        Ok(Arc::new(FileSink::open(&sink.file.output_dir)?))
    } else {
        tracing::info!("Publishing to broker at {}", sink.broker.rest_url);
        Ok(Arc::new(BrokerSink::new(
            &sink.broker,
            http,
            RetryPolicy::from_config(http),
        )?))
    }
}

/// Runs `body` with the sink, then closes the sink exactly once
///
/// The sink is closed whether `body` succeeds or fails. If `body` fails, its
/// error wins and a close failure is only logged; if `body` succeeds, a close
/// failure becomes the result.
pub async fn with_sink<F, Fut, T, E>(sink: Arc<dyn PublishSink>, body: F) -> Result<T, E>
where
    F: FnOnce(Arc<dyn PublishSink>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<SinkError>,
{
    let outcome = body(Arc::clone(&sink)).await;
    let closed = sink.close().await;

    match (outcome, closed) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(close_error)) => {
            tracing::warn!("Failed to close sink after error: {}", close_error);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        closes: AtomicUsize,
    }

    #[async_trait]
    impl PublishSink for CountingSink {
        async fn send_brand(&self, _brand: &Brand) -> SinkResult<()> {
            Ok(())
        }

        async fn send_product(&self, _product: &Product) -> SinkResult<()> {
            Ok(())
        }

        async fn send_quantity(&self, _record: &QuantityRecord) -> SinkResult<()> {
            Ok(())
        }

        async fn close(&self) -> SinkResult<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_with_sink_closes_on_success() {
        let sink = Arc::new(CountingSink::default());
        let result: Result<u32, SinkError> = with_sink(sink.clone(), |_| async { Ok(7) }).await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_sink_closes_on_error() {
        let sink = Arc::new(CountingSink::default());
        let result: Result<(), SinkError> =
            with_sink(sink.clone(), |_| async { Err(SinkError::Closed) }).await;

        assert!(matches!(result, Err(SinkError::Closed)));
        assert_eq!(sink.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_build_mock_sink_creates_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SinkConfig::default();
        config.mock = true;
        config.file.output_dir = dir.path().join("out");

        let sink = build_sink(&config, &HttpConfig::default()).unwrap();
        sink.close().await.unwrap();

        assert!(dir.path().join("out").join("products.json").exists());
    }
}
