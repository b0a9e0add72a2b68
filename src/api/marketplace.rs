//! Marketplace endpoint catalog
//!
//! Builds the URLs and header profiles for each upstream endpoint and routes
//! the requests through a `JsonFetcher`.

use crate::api::client::{JsonFetcher, TransportError};
use crate::config::{EndpointsConfig, MAX_DETAIL_BATCH};
use crate::ConfigError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use reqwest::Method;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Header set sent with a request, chosen per endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProfile {
    /// Brand-list endpoint, which is rate limited per IP
    Brand,
    /// Catalog and product-detail endpoints
    Product,
    /// Static JSON files
    Static,
}

/// Typed access to the marketplace endpoints
pub struct MarketplaceApi {
    fetcher: Arc<dyn JsonFetcher>,
    api_base: Url,
    catalog_base: Url,
    card_base: Url,
    static_base: Url,
    dest: i64,
}

impl MarketplaceApi {
    /// Creates the API on top of a fetcher
    ///
    /// # Arguments
    ///
    /// * `fetcher` - The transport, usually a `RetryingHttpClient`
    /// * `endpoints` - Base URLs and region settings
    ///
    /// # Returns
    ///
    /// * `Ok(MarketplaceApi)` - All base URLs parsed
    /// * `Err(ConfigError)` - A base URL is not a usable http(s) URL
    pub fn new(fetcher: Arc<dyn JsonFetcher>, endpoints: &EndpointsConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            fetcher,
            api_base: parse_base("api_base_url", &endpoints.api_base_url)?,
            catalog_base: parse_base("catalog_api_url", &endpoints.catalog_api_url)?,
            card_base: parse_base("card_api_url", &endpoints.card_api_url)?,
            static_base: parse_base("static_api_url", &endpoints.static_api_url)?,
            dest: endpoints.dest,
        })
    }

    /// URL of the brand list for one letter
    pub fn brands_url(&self, letter: &str) -> Url {
        let mut url = endpoint(&self.api_base, &["wildberries", "brandlist", "data"]);
        url.query_pairs_mut().append_pair("letter", letter);
        url
    }

    /// URL of one page of a brand's catalog
    pub fn products_url(&self, brand_id: u32, page: u32) -> Url {
        let mut url = endpoint(&self.catalog_base, &["brands", "v2", "catalog"]);
        url.query_pairs_mut()
            .append_pair("ab_testing", "false")
            .append_pair("appType", "1")
            .append_pair("brand", &brand_id.to_string())
            .append_pair("curr", "rub")
            .append_pair("dest", &self.dest.to_string())
            .append_pair("lang", "ru")
            .append_pair("page", &page.to_string())
            .append_pair("sort", "popular")
            .append_pair("spp", "30");
        url
    }

    /// URL of the product-detail batch for the given ids
    pub fn details_url(&self, product_ids: &[u64]) -> Url {
        let nm = product_ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(";");

        let mut url = endpoint(&self.card_base, &["cards", "v2", "detail"]);
        url.query_pairs_mut()
            .append_pair("appType", "1")
            .append_pair("curr", "rub")
            .append_pair("dest", &self.dest.to_string())
            .append_pair("lang", "ru")
            .append_pair("ab_testing", "false")
            .append_pair("nm", &nm);
        url
    }

    /// URL of the category list
    pub fn subjects_url(&self) -> Url {
        endpoint(&self.static_base, &["vol0", "data", "subject-base.json"])
    }

    /// URL of the warehouse list
    pub fn stores_url(&self) -> Url {
        endpoint(&self.static_base, &["vol0", "data", "stores-data.json"])
    }

    /// Fetches the brands whose names start with `letter`
    pub async fn brands_by_letter(&self, letter: &str) -> Result<Value, TransportError> {
        let url = self.brands_url(letter);
        self.request(Method::POST, &url, HeaderProfile::Brand).await
    }

    /// Fetches the category list
    pub async fn subjects(&self) -> Result<Value, TransportError> {
        let url = self.subjects_url();
        self.request(Method::GET, &url, HeaderProfile::Static).await
    }

    /// Fetches one page of a brand's catalog
    pub async fn products_by_brand(&self, brand_id: u32, page: u32) -> Result<Value, TransportError> {
        let url = self.products_url(brand_id, page);
        self.request(Method::GET, &url, HeaderProfile::Product).await
    }

    /// Fetches product details (sizes and stocks)
    ///
    /// The endpoint accepts at most 500 ids; extra ids are dropped with a
    /// warning. An empty id list makes no request and yields `Value::Null`.
    pub async fn product_details(&self, product_ids: &[u64]) -> Result<Value, TransportError> {
        if product_ids.is_empty() {
            return Ok(Value::Null);
        }

        let ids = if product_ids.len() > MAX_DETAIL_BATCH {
            tracing::warn!(
                "Detail batch of {} ids truncated to {}",
                product_ids.len(),
                MAX_DETAIL_BATCH
            );
            &product_ids[..MAX_DETAIL_BATCH]
        } else {
            product_ids
        };

        let url = self.details_url(ids);
        self.request(Method::GET, &url, HeaderProfile::Product).await
    }

    /// Fetches the warehouse list
    pub async fn stores(&self) -> Result<Value, TransportError> {
        let url = self.stores_url();
        self.request(Method::GET, &url, HeaderProfile::Static).await
    }

    /// Builds the headers for a profile
    pub fn headers(&self, profile: HeaderProfile) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let origin = self.api_base.origin().ascii_serialization();

        match profile {
            HeaderProfile::Brand => {
                headers.insert(
                    HeaderName::from_static("x-requested-with"),
                    HeaderValue::from_static("XMLHttpRequest"),
                );
                headers.insert(
                    reqwest::header::ACCEPT,
                    HeaderValue::from_static("application/json, text/plain, */*"),
                );
                insert_site_headers(&mut headers, &origin, "/brands");
            }
            HeaderProfile::Product => {
                headers.insert(
                    reqwest::header::ACCEPT,
                    HeaderValue::from_static("application/json"),
                );
                insert_site_headers(&mut headers, &origin, "/");
            }
            HeaderProfile::Static => {}
        }

        headers
    }

    async fn request(
        &self,
        method: Method,
        url: &Url,
        profile: HeaderProfile,
    ) -> Result<Value, TransportError> {
        let headers = self.headers(profile);
        self.fetcher.fetch(method, url.as_str(), &headers).await
    }
}

fn insert_site_headers(headers: &mut HeaderMap, origin: &str, referer_path: &str) {
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ORIGIN, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{}{}", origin, referer_path)) {
        headers.insert(REFERER, value);
    }
}

fn parse_base(name: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must be an http(s) base URL, got '{}'",
            name, value
        )));
    }

    Ok(url)
}

/// Appends path segments to a base URL, keeping any prefix path it has
fn endpoint(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingFetcher {
        requests: Mutex<Vec<(Method, String)>>,
    }

    #[async_trait]
    impl JsonFetcher for RecordingFetcher {
        async fn fetch(
            &self,
            method: Method,
            url: &str,
            _headers: &HeaderMap,
        ) -> Result<Value, TransportError> {
            self.requests.lock().unwrap().push((method, url.to_string()));
            Ok(Value::Null)
        }
    }

    fn test_endpoints() -> EndpointsConfig {
        EndpointsConfig {
            api_base_url: "https://www.example.com".to_string(),
            catalog_api_url: "https://catalog.example.com/".to_string(),
            card_api_url: "https://card.example.com".to_string(),
            static_api_url: "https://static.example.com/basket".to_string(),
            dest: 12358314,
        }
    }

    fn create_api() -> (Arc<RecordingFetcher>, MarketplaceApi) {
        let fetcher = Arc::new(RecordingFetcher::default());
        let api = MarketplaceApi::new(fetcher.clone(), &test_endpoints()).unwrap();
        (fetcher, api)
    }

    fn query(url: &Url) -> HashMap<String, String> {
        url.query_pairs().into_owned().collect()
    }

    #[test]
    fn test_products_url() {
        let (_, api) = create_api();
        let url = api.products_url(17, 3);

        assert_eq!(url.path(), "/brands/v2/catalog");
        let params = query(&url);
        assert_eq!(params["brand"], "17");
        assert_eq!(params["page"], "3");
        assert_eq!(params["dest"], "12358314");
        assert_eq!(params["sort"], "popular");
    }

    #[test]
    fn test_details_url_joins_ids() {
        let (_, api) = create_api();
        let url = api.details_url(&[1, 22, 333]);

        assert_eq!(url.path(), "/cards/v2/detail");
        assert_eq!(query(&url)["nm"], "1;22;333");
    }

    #[test]
    fn test_static_urls_keep_base_path() {
        let (_, api) = create_api();
        assert_eq!(
            api.stores_url().as_str(),
            "https://static.example.com/basket/vol0/data/stores-data.json"
        );
        assert_eq!(
            api.subjects_url().as_str(),
            "https://static.example.com/basket/vol0/data/subject-base.json"
        );
    }

    #[test]
    fn test_brand_url_encodes_letter() {
        let (_, api) = create_api();
        let url = api.brands_url("Б");
        assert_eq!(query(&url)["letter"], "Б");
    }

    #[test]
    fn test_header_profiles_differ() {
        let (_, api) = create_api();
        let brand = api.headers(HeaderProfile::Brand);
        let product = api.headers(HeaderProfile::Product);
        let stat = api.headers(HeaderProfile::Static);

        assert!(brand.contains_key("x-requested-with"));
        assert!(!product.contains_key("x-requested-with"));
        assert_eq!(
            product.get(ORIGIN).unwrap().to_str().unwrap(),
            "https://www.example.com"
        );
        assert!(stat.is_empty());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let mut endpoints = test_endpoints();
        endpoints.card_api_url = "mailto:someone@example.com".to_string();
        let result = MarketplaceApi::new(Arc::new(RecordingFetcher::default()), &endpoints);
        assert!(matches!(result, Err(ConfigError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_brand_request_is_post() {
        let (fetcher, api) = create_api();
        api.brands_by_letter("A").await.unwrap();

        let requests = fetcher.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0, Method::POST);
    }

    #[tokio::test]
    async fn test_empty_detail_batch_skips_request() {
        let (fetcher, api) = create_api();
        let value = api.product_details(&[]).await.unwrap();

        assert!(value.is_null());
        assert!(fetcher.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_detail_batch_truncated() {
        let (fetcher, api) = create_api();
        let ids: Vec<u64> = (1..=600).collect();
        api.product_details(&ids).await.unwrap();

        let requests = fetcher.requests.lock().unwrap();
        let url = Url::parse(&requests[0].1).unwrap();
        let nm = query(&url)["nm"].clone();
        assert_eq!(nm.split(';').count(), 500);
    }
}
