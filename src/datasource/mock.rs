//! Mock data source for testing without network calls.

use super::{DataSource, DataSourceError, DataSourceFactory};
use crate::domain::ordering::sort_fills_deterministic;
use crate::domain::{Fill, ProxyEndpoint};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

/// A request observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillsRequest {
    pub user: String,
    pub start_ms: i64,
    pub end_ms: i64,
}

#[derive(Debug, Clone)]
enum ScriptedFailure {
    Range {
        start_ms: i64,
        end_ms: i64,
        error: DataSourceError,
    },
    User {
        user: String,
        error: DataSourceError,
    },
}

/// Mock data source that serves predefined fills.
///
/// With a page limit set, a request whose range holds more fills than the
/// limit returns only the oldest `limit` of them, mimicking the provider's
/// silent truncation. Clones share the request log.
#[derive(Debug, Clone, Default)]
pub struct MockDataSource {
    fills: Vec<Fill>,
    page_limit: Option<usize>,
    failures: Vec<ScriptedFailure>,
    requests: Arc<Mutex<Vec<FillsRequest>>>,
    bound_proxies: Arc<Mutex<Vec<Option<i64>>>>,
}

impl MockDataSource {
    /// Create a new mock data source with empty data.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fill to the mock data source.
    pub fn with_fill(mut self, fill: Fill) -> Self {
        self.fills.push(fill);
        self
    }

    /// Add multiple fills to the mock data source.
    pub fn with_fills(mut self, fills: Vec<Fill>) -> Self {
        self.fills.extend(fills);
        self
    }

    /// Truncate every response to at most `limit` fills.
    pub fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Fail any request for exactly `[start_ms, end_ms)`.
    pub fn with_range_failure(mut self, start_ms: i64, end_ms: i64, error: DataSourceError) -> Self {
        self.failures.push(ScriptedFailure::Range {
            start_ms,
            end_ms,
            error,
        });
        self
    }

    /// Fail every request for `user`.
    pub fn with_user_failure(mut self, user: &str, error: DataSourceError) -> Self {
        self.failures.push(ScriptedFailure::User {
            user: user.to_string(),
            error,
        });
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<FillsRequest> {
        lock(&self.requests).clone()
    }

    /// Proxy ids this mock was bound to through [`DataSourceFactory::build`].
    pub fn bound_proxies(&self) -> Vec<Option<i64>> {
        lock(&self.bound_proxies).clone()
    }

    fn scripted_failure(&self, user: &str, start_ms: i64, end_ms: i64) -> Option<DataSourceError> {
        self.failures.iter().find_map(|f| match f {
            ScriptedFailure::Range {
                start_ms: s,
                end_ms: e,
                error,
            } if *s == start_ms && *e == end_ms => Some(error.clone()),
            ScriptedFailure::User { user: u, error } if u == user => Some(error.clone()),
            _ => None,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch_fills_by_time(
        &self,
        user: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Fill>, DataSourceError> {
        lock(&self.requests).push(FillsRequest {
            user: user.to_string(),
            start_ms,
            end_ms,
        });

        if let Some(error) = self.scripted_failure(user, start_ms, end_ms) {
            return Err(error);
        }

        let mut page: Vec<Fill> = self
            .fills
            .iter()
            .filter(|f| {
                f.address.as_str() == user
                    && f.time_ms.as_i64() >= start_ms
                    && f.time_ms.as_i64() < end_ms
            })
            .cloned()
            .collect();
        sort_fills_deterministic(&mut page);

        if let Some(limit) = self.page_limit {
            page.truncate(limit);
        }
        Ok(page)
    }
}

impl DataSourceFactory for MockDataSource {
    fn build(
        &self,
        proxy: Option<&ProxyEndpoint>,
    ) -> Result<Arc<dyn DataSource>, DataSourceError> {
        lock(&self.bound_proxies).push(proxy.map(|p| p.id));
        Ok(Arc::new(self.clone()))
    }
}
