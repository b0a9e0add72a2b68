//! Kafka REST proxy sink

use super::{PublishSink, SinkError, SinkResult};
use crate::api::RetryPolicy;
use crate::config::{BrokerConfig, HttpConfig};
use crate::model::{Brand, Product, QuantityRecord};
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const KAFKA_JSON: &str = "application/vnd.kafka.json.v2+json";
const KAFKA_ACCEPT: &str = "application/vnd.kafka.v2+json";

/// Publishes each record to its topic through a Kafka REST proxy
///
/// Every record is sent as `POST {rest_url}/topics/{topic}` with body
/// `{"records":[{"value": <record>}]}`. Failed posts are retried with the
/// same linear backoff as upstream requests.
pub struct BrokerSink {
    client: Client,
    rest_url: String,
    brands_topic: String,
    products_topic: String,
    quantities_topic: String,
    policy: RetryPolicy,
    closed: AtomicBool,
}

impl BrokerSink {
    /// Creates a sink for the configured proxy and topics
    pub fn new(broker: &BrokerConfig, http: &HttpConfig, policy: RetryPolicy) -> SinkResult<Self> {
        let client = Client::builder()
            .user_agent(http.user_agent.clone())
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            rest_url: broker.rest_url.trim_end_matches('/').to_string(),
            brands_topic: broker.brands_topic.clone(),
            products_topic: broker.products_topic.clone(),
            quantities_topic: broker.quantities_topic.clone(),
            policy,
            closed: AtomicBool::new(false),
        })
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/topics/{}", self.rest_url, topic)
    }

    async fn publish<T: Serialize + Sync>(&self, topic: &str, record: &T) -> SinkResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Closed);
        }

        let value = serde_json::to_value(record)?;
        let body = serde_json::to_vec(&json!({ "records": [{ "value": value }] }))?;
        let url = self.topic_url(topic);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let message = match self.post(&url, body.clone()).await {
                Ok(()) => return Ok(()),
                Err(message) => message,
            };

            tracing::warn!(
                "Publish to {} failed on attempt {}/{}: {}",
                topic,
                attempt,
                self.policy.max_attempts,
                message
            );

            if !self.policy.allows_retry_after(attempt) {
                return Err(SinkError::Broker {
                    topic: topic.to_string(),
                    attempts: attempt,
                    message,
                });
            }
        }
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> Result<(), String> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static(KAFKA_JSON))
            .header(ACCEPT, HeaderValue::from_static(KAFKA_ACCEPT))
            .body(body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(format!("unexpected HTTP status {}", status))
        }
    }
}

#[async_trait]
impl PublishSink for BrokerSink {
    async fn send_brand(&self, brand: &Brand) -> SinkResult<()> {
        self.publish(&self.brands_topic, brand).await
    }

    async fn send_product(&self, product: &Product) -> SinkResult<()> {
        self.publish(&self.products_topic, product).await
    }

    async fn send_quantity(&self, record: &QuantityRecord) -> SinkResult<()> {
        self.publish(&self.quantities_topic, record).await
    }

    async fn close(&self) -> SinkResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("Closed broker sink for {}", self.rest_url);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_sink(server: &MockServer, max_attempts: u32) -> BrokerSink {
        let broker = BrokerConfig {
            rest_url: format!("{}/", server.uri()),
            ..BrokerConfig::default()
        };
        BrokerSink::new(
            &broker,
            &HttpConfig::default(),
            RetryPolicy::new(max_attempts, Duration::from_millis(1)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_brand_posted_to_topic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/topics/wb_brands"))
            .and(header("content-type", KAFKA_JSON))
            .and(body_partial_json(json!({"records": [{"value": {"id": 5, "name": "Acme"}}]})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = create_sink(&server, 3);
        sink.send_brand(&Brand::new(5, "Acme", Utc::now())).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_publish_is_retried_then_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/topics/wb_brands"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let sink = create_sink(&server, 2);
        let result = sink.send_brand(&Brand::new(5, "Acme", Utc::now())).await;

        match result {
            Err(SinkError::Broker { topic, attempts, .. }) => {
                assert_eq!(topic, "wb_brands");
                assert_eq!(attempts, 2);
            }
            other => panic!("expected broker error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_sink_rejects_sends() {
        let server = MockServer::start().await;
        let sink = create_sink(&server, 1);

        sink.close().await.unwrap();
        sink.close().await.unwrap();
        let result = sink.send_brand(&Brand::new(1, "Acme", Utc::now())).await;

        assert!(matches!(result, Err(SinkError::Closed)));
    }
}
