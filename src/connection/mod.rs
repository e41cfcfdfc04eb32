//! Connection management for Elasticsearch
//!
//! This module provides:
//! - HTTP client construction with basic authentication
//! - Connection establishment with a bounded retry loop
//! - Cluster health checks
//! - The scroll, count and clear-scroll calls used by the export pipeline

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, ErrorResponse, Result};
use crate::export::{Page, RawRecord, ScrollBackend};

/// Elasticsearch client bound to one index pattern
#[derive(Clone)]
pub struct ElasticClient {
    /// HTTP client instance
    http: Client,

    /// Endpoint URL without trailing slash
    base_url: String,

    /// Index name or pattern
    index: String,

    /// Basic auth credentials
    username: String,
    password: String,
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Cluster status: green, yellow or red
    pub status: String,

    /// Response time in milliseconds
    pub response_time_ms: u64,

    /// Cluster name, if reported
    pub cluster_name: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status != "red"
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Debug, Deserialize)]
struct ClusterHealthResponse {
    status: String,
    cluster_name: Option<String>,
}

impl ElasticClient {
    /// Create a new client without contacting the server
    ///
    /// # Arguments
    /// * `config` - Connection configuration
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        config.validate_url()?;
        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Create a client and verify the server answers
    ///
    /// Retries up to `retry_attempts` times, sleeping `retry_delay_secs`
    /// between attempts.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let client = Self::new(config)?;
        let attempts = config.retry_attempts.max(1);
        let delay = config.retry_delay();

        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match client.ping().await {
                Ok(version) => {
                    info!(
                        "Connected to Elasticsearch {} at {}",
                        version.as_deref().unwrap_or("(unknown version)"),
                        client.base_url
                    );
                    return Ok(client);
                }
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        warn!(
                            "Error connecting to Elasticsearch (attempt {}/{}): {}, retrying in {}s",
                            attempt,
                            attempts,
                            e,
                            delay.as_secs()
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(ConnectionError::ConnectionFailed(format!(
            "{} after {} attempts: {}",
            client.base_url, attempts, last_error
        ))
        .into())
    }

    /// Ping the root endpoint, returning the server version if reported
    pub async fn ping(&self) -> Result<Option<String>> {
        let body = self.send(self.http.get(self.url(""))).await?.json::<Value>().await?;
        Ok(body["version"]["number"].as_str().map(str::to_string))
    }

    /// Perform health check on the cluster for the configured index
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let start = Instant::now();
        let path = format!("_cluster/health/{}", self.index);
        let health: ClusterHealthResponse =
            self.send(self.http.get(self.url(&path))).await?.json().await?;

        Ok(HealthStatus {
            status: health.status,
            response_time_ms: start.elapsed().as_millis() as u64,
            cluster_name: health.cluster_name,
        })
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send an authenticated request, turning non-success statuses into errors
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = ErrorResponse::from_body(status.as_u16(), &body);
        if let Ok(json) = error.to_json_compact() {
            debug!("Backend error response: {}", json);
        }
        Err(error.into())
    }

    async fn read_page(response: Response) -> Result<Page> {
        let search: SearchResponse = response.json().await?;
        let records = search
            .hits
            .hits
            .into_iter()
            .map(|hit| {
                let source = hit.source.unwrap_or(Value::Null).to_string();
                RawRecord::new(hit.index, source)
            })
            .collect();

        Ok(Page {
            records,
            scroll_id: search.scroll_id,
        })
    }
}

#[async_trait]
impl ScrollBackend for ElasticClient {
    async fn count_matching(&self, query: &Value) -> Result<u64> {
        let path = format!("{}/_count", self.index);
        let body = json!({ "query": query });
        let count: CountResponse = self
            .send(self.http.post(self.url(&path)).json(&body))
            .await?
            .json()
            .await?;
        debug!("Count query matched {} documents", count.count);
        Ok(count.count)
    }

    async fn open_scroll(&self, query: &Value, page_size: usize, keep_alive: &str) -> Result<Page> {
        let path = format!("{}/_search", self.index);
        let body = json!({ "size": page_size, "query": query });
        let request = self
            .http
            .post(self.url(&path))
            .query(&[("scroll", keep_alive)])
            .json(&body);
        Self::read_page(self.send(request).await?).await
    }

    async fn fetch_next(&self, scroll_id: &str, keep_alive: &str) -> Result<Page> {
        let body = json!({ "scroll": keep_alive, "scroll_id": scroll_id });
        let request = self.http.post(self.url("_search/scroll")).json(&body);
        Self::read_page(self.send(request).await?).await
    }

    async fn clear_scroll(&self, scroll_id: &str) -> Result<()> {
        let body = json!({ "scroll_id": [scroll_id] });
        self.send(self.http.delete(self.url("_search/scroll")).json(&body))
            .await?;
        Ok(())
    }
}
