use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for Catalog-Crawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub crawler: CrawlerConfig,
    pub endpoints: EndpointsConfig,
    pub sink: SinkConfig,
    pub storage: StorageConfig,
}

/// HTTP client behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// User-Agent sent with every upstream request
    pub user_agent: String,

    /// Total attempts per request, including the first one
    pub max_retries: u32,

    /// Base of the linear backoff between attempts (milliseconds)
    pub retry_base_delay_ms: u64,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: "Wildberries Parser".to_string(),
            max_retries: 3,
            retry_base_delay_ms: 500,
            timeout_secs: 30,
        }
    }
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Pause between sequential requests (brand letters, detail batches)
    pub request_delay_ms: u64,

    /// Maximum number of catalog pages in flight at once
    pub concurrency: usize,

    /// Product ids per detail request
    pub chunk_size: usize,

    /// Maximum number of detail requests in flight at once
    pub detail_concurrency: usize,

    /// Run deadline in seconds, counted from when the orchestrator is built
    ///
    /// Time spent on brand discovery counts toward it. Once it passes,
    /// queued catalog pages and detail batches are dropped and their
    /// in-flight requests aborted. Discovery itself is never interrupted.
    pub run_timeout_secs: Option<u64>,

    /// JSON file with the brand-list alphabet
    pub letters_path: PathBuf,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            request_delay_ms: 500,
            concurrency: DEFAULT_CONCURRENCY,
            chunk_size: DEFAULT_CHUNK_SIZE,
            detail_concurrency: 1,
            run_timeout_secs: None,
            letters_path: PathBuf::from("store/letters.json"),
        }
    }
}

/// Default catalog pagination concurrency
pub const DEFAULT_CONCURRENCY: usize = 50;

/// Default detail request chunk size
pub const DEFAULT_CHUNK_SIZE: usize = 100;

/// Upstream endpoint configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EndpointsConfig {
    /// Base URL of the brand-list endpoint
    pub api_base_url: String,

    /// Base URL of the per-brand catalog endpoint
    pub catalog_api_url: String,

    /// Base URL of the product-detail endpoint
    pub card_api_url: String,

    /// Base URL of the static JSON files (categories, warehouses)
    pub static_api_url: String,

    /// Delivery region the catalog prices and stocks are resolved for
    pub dest: i64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://www.wildberries.ru".to_string(),
            catalog_api_url: "https://catalog.wb.ru".to_string(),
            card_api_url: "https://card.wb.ru".to_string(),
            static_api_url: "https://static-basket-01.wbbasket.ru".to_string(),
            dest: 12358314,
        }
    }
}

/// Sink selection and targets
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SinkConfig {
    /// Write records to local files instead of the broker
    pub mock: bool,

    pub broker: BrokerConfig,

    pub file: FileSinkConfig,
}

/// Message broker (Kafka REST proxy) configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrokerConfig {
    /// Base URL of the REST proxy
    pub rest_url: String,

    pub brands_topic: String,
    pub products_topic: String,
    pub quantities_topic: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            rest_url: "http://localhost:8082".to_string(),
            brands_topic: "wb_brands".to_string(),
            products_topic: "wb_products".to_string(),
            quantities_topic: "wb_quantities".to_string(),
        }
    }
}

/// File sink configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileSinkConfig {
    /// Directory the record files are appended to
    pub output_dir: PathBuf,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
        }
    }
}

/// Brand registry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite brand registry
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("brands.db"),
        }
    }
}
