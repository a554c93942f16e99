//! Delivery Strategies
//!
//! The ordered chain of mechanisms a batch is offered to. The first strategy
//! that accepts the batch ends the attempt:
//!
//! 1. `BeaconStrategy` hands the payload to a detached task and returns at
//!    once, so it is safe during teardown.
//! 2. `HttpPostStrategy` performs a regular POST and waits for a 2xx.
//! 3. `PixelStrategy` issues a GET with the payload in the query string and
//!    accepts whatever happens within a short wait.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use reqwest::header::{CONNECTION, CONTENT_TYPE};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use url::Url;

use super::error::{DeliveryError, DeliveryResult};

/// Content type of every batch body
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Query parameter carrying the payload for pixel delivery
pub const PIXEL_PARAM: &str = "d";

/// One batch offered to a strategy
#[derive(Debug, Clone, Copy)]
pub struct DeliveryRequest<'a> {
    pub endpoint: &'a str,
    pub body: &'a str,
    /// Set for teardown and size-pressure flushes
    pub urgent: bool,
}

/// A mechanism able to ship one encoded batch
#[async_trait]
pub trait DeliveryStrategy: Send + Sync {
    /// Short name used in logs and stats
    fn name(&self) -> &'static str;

    /// Attempt delivery; `Ok` means the batch is considered shipped
    async fn deliver(&self, request: &DeliveryRequest<'_>) -> DeliveryResult<()>;
}

/// Shared strategy handle
pub type SharedStrategy = Arc<dyn DeliveryStrategy>;

/// Built-in strategy selector used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Beacon,
    Post,
    Pixel,
}

impl StrategyKind {
    /// Default chain order
    pub fn default_chain() -> Vec<StrategyKind> {
        vec![StrategyKind::Beacon, StrategyKind::Post, StrategyKind::Pixel]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Beacon => "beacon",
            StrategyKind::Post => "post",
            StrategyKind::Pixel => "pixel",
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beacon" => Ok(StrategyKind::Beacon),
            "post" | "fetch" => Ok(StrategyKind::Post),
            "pixel" | "image" => Ok(StrategyKind::Pixel),
            _ => Err(format!(
                "Invalid delivery strategy: {}. Valid options: beacon, post, pixel",
                s
            )),
        }
    }
}

/// Settings shared by the built-in strategies
#[derive(Debug, Clone)]
pub struct StrategySettings {
    pub beacon_max_bytes: usize,
    pub request_timeout: Duration,
    pub pixel_wait: Duration,
}

/// Fire-and-forget POST that never blocks the caller
pub struct BeaconStrategy {
    client: reqwest::Client,
    max_bytes: usize,
    tracker: TaskTracker,
}

impl BeaconStrategy {
    pub fn new(client: reqwest::Client, max_bytes: usize, tracker: TaskTracker) -> Self {
        Self { client, max_bytes, tracker }
    }
}

#[async_trait]
impl DeliveryStrategy for BeaconStrategy {
    fn name(&self) -> &'static str {
        "beacon"
    }

    async fn deliver(&self, request: &DeliveryRequest<'_>) -> DeliveryResult<()> {
        if request.body.len() > self.max_bytes {
            return Err(DeliveryError::unavailable(format!(
                "payload of {} bytes exceeds beacon limit of {} bytes",
                request.body.len(),
                self.max_bytes
            )));
        }
        let handle = Handle::try_current()
            .map_err(|_| DeliveryError::unavailable("no runtime to queue beacon on"))?;

        let client = self.client.clone();
        let endpoint = request.endpoint.to_string();
        let body = request.body.to_string();
        self.tracker.spawn_on(
            async move {
                match client
                    .post(&endpoint)
                    .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                    .body(body)
                    .send()
                    .await
                {
                    Ok(response) => trace!("Beacon answered with {}", response.status()),
                    Err(e) => debug!("Beacon to {} failed after queueing: {}", endpoint, e),
                }
            },
            &handle,
        );
        Ok(())
    }
}

/// Regular POST; connection reuse is requested only for urgent flushes
pub struct HttpPostStrategy {
    client: reqwest::Client,
}

impl HttpPostStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeliveryStrategy for HttpPostStrategy {
    fn name(&self) -> &'static str {
        "post"
    }

    async fn deliver(&self, request: &DeliveryRequest<'_>) -> DeliveryResult<()> {
        let connection = if request.urgent { "keep-alive" } else { "close" };
        let response = self
            .client
            .post(request.endpoint)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header(CONNECTION, connection)
            .body(request.body.to_string())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Rejected { status: status.as_u16() })
        }
    }
}

/// Last-resort GET with the payload in the query string
pub struct PixelStrategy {
    client: reqwest::Client,
    wait: Duration,
}

impl PixelStrategy {
    pub fn new(client: reqwest::Client, wait: Duration) -> Self {
        Self { client, wait }
    }

    /// Endpoint with the encoded payload appended as `d=`
    pub fn pixel_url(endpoint: &str, body: &str) -> DeliveryResult<Url> {
        let mut url = Url::parse(endpoint)
            .map_err(|e| DeliveryError::unavailable(format!("invalid endpoint {}: {}", endpoint, e)))?;
        url.query_pairs_mut().append_pair(PIXEL_PARAM, body);
        Ok(url)
    }
}

#[async_trait]
impl DeliveryStrategy for PixelStrategy {
    fn name(&self) -> &'static str {
        "pixel"
    }

    async fn deliver(&self, request: &DeliveryRequest<'_>) -> DeliveryResult<()> {
        let url = Self::pixel_url(request.endpoint, request.body)?;

        // Load, error and timeout all count as done
        match tokio::time::timeout(self.wait, self.client.get(url).send()).await {
            Ok(Ok(response)) => trace!("Pixel loaded with {}", response.status()),
            Ok(Err(e)) => debug!("Pixel errored: {}", e),
            Err(_) => debug!("Pixel wait elapsed after {:?}", self.wait),
        }
        Ok(())
    }
}

/// Build the HTTP client shared by the built-in strategies
pub fn http_client(settings: &StrategySettings) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .user_agent(concat!("rumkit/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Instantiate the configured chain in order
pub fn build_chain(
    kinds: &[StrategyKind],
    settings: &StrategySettings,
    tracker: &TaskTracker,
) -> Result<Vec<SharedStrategy>, reqwest::Error> {
    let client = http_client(settings)?;
    let chain = kinds
        .iter()
        .map(|kind| -> SharedStrategy {
            match kind {
                StrategyKind::Beacon => Arc::new(BeaconStrategy::new(
                    client.clone(),
                    settings.beacon_max_bytes,
                    tracker.clone(),
                )),
                StrategyKind::Post => Arc::new(HttpPostStrategy::new(client.clone())),
                StrategyKind::Pixel => Arc::new(PixelStrategy::new(client.clone(), settings.pixel_wait)),
            }
        })
        .collect();
    Ok(chain)
}
