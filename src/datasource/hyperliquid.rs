//! Hyperliquid API client implementation.

use super::{DataSource, DataSourceError, DataSourceFactory};
use crate::domain::{Address, Coin, Fill, ProxyEndpoint, TimeMs};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Maximum fills returned by one `userFillsByTime` request.
pub const FILLS_PAGE_LIMIT: usize = 2000;

pub const DEFAULT_API_URL: &str = "https://api.hyperliquid.xyz";
pub const DEFAULT_LEADERBOARD_URL: &str = "https://stats-data.hyperliquid.xyz/Mainnet/leaderboard";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Hyperliquid data source using the public Info API.
#[derive(Debug, Clone)]
pub struct HyperliquidDataSource {
    client: Client,
    base_url: String,
    leaderboard_url: String,
}

impl HyperliquidDataSource {
    /// Create a direct (unproxied) data source with the default timeout.
    pub fn new(base_url: String) -> Result<Self, DataSourceError> {
        Self::with_options(
            base_url,
            DEFAULT_LEADERBOARD_URL.to_string(),
            None,
            DEFAULT_TIMEOUT,
        )
    }

    /// Create with default Hyperliquid API URL.
    pub fn default_url() -> Result<Self, DataSourceError> {
        Self::new(DEFAULT_API_URL.to_string())
    }

    /// Create a data source bound to zero or one proxy, with an absolute per-call timeout.
    pub fn with_options(
        base_url: String,
        leaderboard_url: String,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<Self, DataSourceError> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy.to_url())
                .map_err(|e| DataSourceError::InvalidProxy(format!("{}: {}", proxy.redacted(), e)))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| DataSourceError::Other(format!("build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            leaderboard_url,
        })
    }

    async fn post_info<T: DeserializeOwned>(
        &self,
        request: &InfoRequest<'_>,
    ) -> Result<T, DataSourceError> {
        let url = format!("{}/info", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(map_send_error)?;

        decode(response).await
    }

    /// Leaderboard snapshot (collaborator endpoint).
    pub async fn fetch_leaderboard(&self) -> Result<serde_json::Value, DataSourceError> {
        debug!("Fetching leaderboard from {}", self.leaderboard_url);
        let response = self
            .client
            .get(&self.leaderboard_url)
            .send()
            .await
            .map_err(map_send_error)?;
        decode(response).await
    }

    /// Account value and PnL history (collaborator endpoint).
    pub async fn fetch_portfolio(&self, user: &str) -> Result<serde_json::Value, DataSourceError> {
        self.post_info(&InfoRequest::Portfolio { user }).await
    }

    /// Perpetuals positions and margin summary (collaborator endpoint).
    pub async fn fetch_clearinghouse_state(
        &self,
        user: &str,
    ) -> Result<serde_json::Value, DataSourceError> {
        self.post_info(&InfoRequest::ClearinghouseState { user }).await
    }

    /// Spot balances (collaborator endpoint).
    pub async fn fetch_spot_clearinghouse_state(
        &self,
        user: &str,
    ) -> Result<serde_json::Value, DataSourceError> {
        self.post_info(&InfoRequest::SpotClearinghouseState { user })
            .await
    }
}

#[async_trait]
impl DataSource for HyperliquidDataSource {
    async fn fetch_fills_by_time(
        &self,
        user: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Fill>, DataSourceError> {
        debug!(
            "Fetching fills for user={}, start_ms={}, end_ms={}",
            user, start_ms, end_ms
        );

        if end_ms <= start_ms {
            return Ok(Vec::new());
        }

        // The API treats endTime as inclusive.
        let request = InfoRequest::UserFillsByTime {
            user,
            start_time: start_ms,
            end_time: end_ms - 1,
        };
        let wire: Vec<WireFill> = self.post_info(&request).await?;

        Ok(wire.into_iter().map(|w| w.into_fill(user)).collect())
    }
}

/// Builds Hyperliquid clients sharing one configuration.
#[derive(Debug, Clone)]
pub struct HyperliquidClientFactory {
    pub base_url: String,
    pub leaderboard_url: String,
    pub timeout: Duration,
}

impl DataSourceFactory for HyperliquidClientFactory {
    fn build(
        &self,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<Arc<dyn DataSource>, DataSourceError> {
        let client = HyperliquidDataSource::with_options(
            self.base_url.clone(),
            self.leaderboard_url.clone(),
            proxy,
            self.timeout,
        )?;
        Ok(Arc::new(client))
    }
}

/// Requests multiplexed over the `/info` endpoint.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum InfoRequest<'a> {
    #[serde(rename_all = "camelCase")]
    UserFillsByTime {
        user: &'a str,
        start_time: i64,
        end_time: i64,
    },
    Portfolio {
        user: &'a str,
    },
    ClearinghouseState {
        user: &'a str,
    },
    SpotClearinghouseState {
        user: &'a str,
    },
}

/// Fill as returned by `userFillsByTime`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFill {
    coin: String,
    px: String,
    sz: String,
    side: String,
    time: i64,
    #[serde(default)]
    start_position: String,
    #[serde(default)]
    dir: String,
    #[serde(default)]
    closed_pnl: String,
    #[serde(default)]
    hash: String,
    #[serde(default)]
    oid: i64,
    #[serde(default)]
    crossed: bool,
    #[serde(default)]
    fee: String,
    tid: i64,
    #[serde(default)]
    cloid: Option<String>,
    #[serde(default)]
    fee_token: String,
}

impl WireFill {
    fn into_fill(self, user: &str) -> Fill {
        Fill {
            address: Address::new(user.to_string()),
            coin: Coin::new(self.coin),
            px: self.px,
            sz: self.sz,
            side: self.side,
            time_ms: TimeMs::new(self.time),
            start_position: self.start_position,
            dir: self.dir,
            closed_pnl: self.closed_pnl,
            fee: self.fee,
            fee_token: self.fee_token,
            hash: self.hash,
            oid: self.oid,
            cloid: self.cloid,
            crossed: self.crossed,
            tid: self.tid,
        }
    }
}

fn map_send_error(err: reqwest::Error) -> DataSourceError {
    if err.is_timeout() {
        DataSourceError::Timeout
    } else {
        DataSourceError::NetworkError(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, DataSourceError> {
    let status = response.status();
    if status.as_u16() == 429 {
        return Err(DataSourceError::RateLimited);
    }
    if !status.is_success() {
        return Err(DataSourceError::HttpError {
            status: status.as_u16(),
            message: status.canonical_reason().unwrap_or("unexpected status").to_string(),
        });
    }

    let body = response.bytes().await.map_err(map_send_error)?;
    serde_json::from_slice(&body).map_err(|e| DataSourceError::ParseError(e.to_string()))
}
