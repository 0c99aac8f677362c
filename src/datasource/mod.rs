//! Network client abstraction for fetching fills from the exchange.

use crate::domain::{Fill, ProxyEndpoint};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub mod hyperliquid;
pub mod mock;

pub use hyperliquid::{HyperliquidClientFactory, HyperliquidDataSource, FILLS_PAGE_LIMIT};
pub use mock::MockDataSource;

/// Data source trait for fetching fills.
///
/// One call is one request: implementations must not paginate, retry or
/// back off. Range splitting lives in [`crate::harvest::RangeFetcher`].
#[async_trait]
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Fetch one page of fills for a user within a half-open time range.
    ///
    /// # Arguments
    /// * `user` - User address
    /// * `start_ms` - Start time in milliseconds (inclusive)
    /// * `end_ms` - End time in milliseconds (exclusive)
    ///
    /// # Returns
    /// At most one page of fills, oldest first. A page that is exactly
    /// [`FILLS_PAGE_LIMIT`] long may have been truncated by the provider.
    async fn fetch_fills_by_time(
        &self,
        user: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Fill>, DataSourceError>;
}

/// Builds one data source per egress identity.
pub trait DataSourceFactory: Send + Sync {
    /// Build a client that routes through `proxy`, or connects directly when `None`.
    fn build(&self, proxy: Option<&ProxyEndpoint>)
        -> Result<Arc<dyn DataSource>, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Network error (e.g., connection refused, DNS failure)
    NetworkError(String),
    /// The request exceeded its deadline
    Timeout,
    /// Non-success HTTP status other than 429
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (HTTP 429)
    RateLimited,
    /// Proxy URL rejected while building a client
    InvalidProxy(String),
    /// Other error
    Other(String),
}

impl DataSourceError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DataSourceError::RateLimited)
    }
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::Timeout => write!(f, "Request timed out"),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::InvalidProxy(msg) => write!(f, "Invalid proxy: {}", msg),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection refused".to_string());
        assert_eq!(err.to_string(), "Network error: connection refused");

        let err = DataSourceError::HttpError {
            status: 500,
            message: "Internal Server Error".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 500: Internal Server Error");

        let err = DataSourceError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        assert_eq!(DataSourceError::RateLimited.to_string(), "Rate limited");
        assert_eq!(DataSourceError::Timeout.to_string(), "Request timed out");
    }

    #[test]
    fn test_rate_limited_is_distinguished() {
        assert!(DataSourceError::RateLimited.is_rate_limited());
        assert!(!DataSourceError::HttpError {
            status: 503,
            message: String::new()
        }
        .is_rate_limited());
        assert!(!DataSourceError::Timeout.is_rate_limited());
    }
}
