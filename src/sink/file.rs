//! JSON-lines file sink used in mock mode

use super::{PublishSink, SinkError, SinkResult};
use crate::model::{Brand, Product, QuantityRecord};
use async_trait::async_trait;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const BRANDS_FILE: &str = "brands.json";
const PRODUCTS_FILE: &str = "products.json";
const QUANTITIES_FILE: &str = "quantities.json";

struct Writers {
    brands: BufWriter<File>,
    products: BufWriter<File>,
    quantities: BufWriter<File>,
}

impl Writers {
    fn flush(&mut self) -> std::io::Result<()> {
        self.brands.flush()?;
        self.products.flush()?;
        self.quantities.flush()
    }
}

/// Appends every record as one JSON document per line
///
/// Brands, products and quantities go to separate files in the output
/// directory. Existing files are appended to, never truncated.
pub struct FileSink {
    output_dir: PathBuf,
    writers: Mutex<Option<Writers>>,
}

impl FileSink {
    /// Opens (creating if needed) the three record files in `output_dir`
    pub fn open(output_dir: &Path) -> SinkResult<Self> {
        fs::create_dir_all(output_dir)?;

        let writers = Writers {
            brands: open_append(&output_dir.join(BRANDS_FILE))?,
            products: open_append(&output_dir.join(PRODUCTS_FILE))?,
            quantities: open_append(&output_dir.join(QUANTITIES_FILE))?,
        };

        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            writers: Mutex::new(Some(writers)),
        })
    }

    /// Directory the files are written to
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn append<T, F>(&self, record: &T, select: F) -> SinkResult<()>
    where
        T: Serialize + Sync,
        F: FnOnce(&mut Writers) -> &mut BufWriter<File> + Send,
    {
        let line = serde_json::to_string(record)?;

        let mut guard = self.writers.lock().await;
        let writers = guard.as_mut().ok_or(SinkError::Closed)?;
        writeln!(select(writers), "{}", line)?;
        Ok(())
    }
}

fn open_append(path: &Path) -> std::io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

#[async_trait]
impl PublishSink for FileSink {
    async fn send_brand(&self, brand: &Brand) -> SinkResult<()> {
        self.append(brand, |w| &mut w.brands).await
    }

    async fn send_product(&self, product: &Product) -> SinkResult<()> {
        self.append(product, |w| &mut w.products).await
    }

    async fn send_quantity(&self, record: &QuantityRecord) -> SinkResult<()> {
        self.append(record, |w| &mut w.quantities).await
    }

    async fn close(&self) -> SinkResult<()> {
        let mut guard = self.writers.lock().await;
        if let Some(mut writers) = guard.take() {
            writers.flush()?;
            tracing::debug!("Closed file sink in {}", self.output_dir.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn read_lines(path: &Path) -> Vec<Value> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn sample_product(id: u64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            seller_id: 1,
            brand_id: 2,
            subject_id: 3,
            root: None,
            kind_id: None,
            subject_parent_id: None,
            match_id: None,
            created_at: Utc::now().date_naive(),
            updated_at: Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn test_records_go_to_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::open(dir.path()).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        sink.send_brand(&Brand::new(1, "Acme", now)).await.unwrap();
        sink.send_product(&sample_product(10)).await.unwrap();
        sink.send_product(&sample_product(11)).await.unwrap();
        sink.close().await.unwrap();

        let brands = read_lines(&dir.path().join(BRANDS_FILE));
        let products = read_lines(&dir.path().join(PRODUCTS_FILE));
        let quantities = fs::read_to_string(dir.path().join(QUANTITIES_FILE)).unwrap();

        assert_eq!(brands.len(), 1);
        assert_eq!(brands[0]["updated_at"], "2025-03-01 12:00:00");
        assert_eq!(products.len(), 2);
        assert_eq!(products[1]["id"], 11);
        assert!(quantities.is_empty());
    }

    #[tokio::test]
    async fn test_send_after_close_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::open(dir.path()).unwrap();

        sink.close().await.unwrap();
        let result = sink.send_product(&sample_product(1)).await;

        assert!(matches!(result, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_double_close_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::open(dir.path()).unwrap();

        sink.close().await.unwrap();
        assert!(sink.close().await.is_ok());
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let dir = tempfile::tempdir().unwrap();

        for id in [1, 2] {
            let sink = FileSink::open(dir.path()).unwrap();
            sink.send_product(&sample_product(id)).await.unwrap();
            sink.close().await.unwrap();
        }

        assert_eq!(read_lines(&dir.path().join(PRODUCTS_FILE)).len(), 2);
    }
}
