//! REST client for the chart server.
//!
//! Two fetch shapes: incremental resources answer
//! `GET /<resource>?since=<token>` with `{results, syncToken, more}`, and
//! full-refresh resources answer `GET /<resource>` with either a bare JSON
//! array or a `{results: [...]}` wrapper. Records are returned as raw JSON
//! values; workers own the decoding so one malformed record never poisons a
//! whole page at the transport level.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Sentinel token for the first fetch of a resource, understood by the
/// server as "everything since the beginning of time".
pub const BEGINNING_OF_TIME_TOKEN: &str = r#"{"t":"0000-00-00T00:00:00.000Z"}"#;

/// One page of an incremental changes feed.
#[derive(Debug, Clone, Deserialize)]
pub struct IncrementalPage {
    #[serde(default)]
    pub results: Vec<serde_json::Value>,
    #[serde(rename = "syncToken")]
    pub sync_token: String,
    #[serde(default)]
    pub more: bool,
}

/// The server operations the sync engine consumes. Object-safe so tests can
/// script a fake server.
#[async_trait]
pub trait ChartServer: Send + Sync {
    /// Fetch one page of changes to `resource` since `token`.
    async fn fetch_incremental(&self, resource: &str, token: &str) -> Result<IncrementalPage>;

    /// Fetch the complete current snapshot of `resource`.
    async fn fetch_all(&self, resource: &str) -> Result<Vec<serde_json::Value>>;
}

/// HTTP implementation of [`ChartServer`] backed by `reqwest`.
pub struct RestClient {
    http: reqwest::Client,
    config: ServerConfig,
}

impl RestClient {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn url(&self, resource: &str) -> String {
        format!("{}/{resource}", self.config.base_url)
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(url)
            .query(query)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("GET {url} returned {status}")));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ChartServer for RestClient {
    async fn fetch_incremental(&self, resource: &str, token: &str) -> Result<IncrementalPage> {
        let url = self.url(resource);
        tracing::debug!(resource, token, "Fetching incremental page");
        let body = self.get_json(&url, &[("since", token)]).await?;
        let page: IncrementalPage = serde_json::from_value(body)?;
        Ok(page)
    }

    async fn fetch_all(&self, resource: &str) -> Result<Vec<serde_json::Value>> {
        let url = self.url(resource);
        tracing::debug!(resource, "Fetching full snapshot");
        let body = self.get_json(&url, &[]).await?;
        extract_results(body)
    }
}

/// Unwrap a full-snapshot response body into its record array.
fn extract_results(body: serde_json::Value) -> Result<Vec<serde_json::Value>> {
    match body {
        serde_json::Value::Array(records) => Ok(records),
        serde_json::Value::Object(mut object) => match object.remove("results") {
            Some(serde_json::Value::Array(records)) => Ok(records),
            _ => Err(Error::MalformedResponse(
                "snapshot response has no results array".into(),
            )),
        },
        _ => Err(Error::MalformedResponse(
            "snapshot response is neither an array nor an object".into(),
        )),
    }
}
