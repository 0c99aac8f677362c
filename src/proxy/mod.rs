//! Egress identities handed out to harvest workers.

use crate::db::Repository;
use crate::domain::ProxyEndpoint;
use std::sync::Arc;
use tracing::info;

/// Immutable snapshot of the active proxies for one run.
///
/// Worker `i` is always bound to proxy `i mod len`, so a worker presents the
/// same identity for the whole run.
#[derive(Debug, Clone, Default)]
pub struct ProxyDirectory {
    proxies: Arc<[ProxyEndpoint]>,
}

impl ProxyDirectory {
    pub fn new(proxies: Vec<ProxyEndpoint>) -> Self {
        Self {
            proxies: proxies.into(),
        }
    }

    /// Load all active proxies from the store.
    pub async fn load(repo: &Repository) -> Result<Self, sqlx::Error> {
        let proxies = repo.load_active_proxies().await?;
        info!("Loaded {} active proxies", proxies.len());
        Ok(Self::new(proxies))
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Proxy for `worker_index`, or `None` (direct connection) when the directory is empty.
    pub fn for_worker(&self, worker_index: usize) -> Option<&ProxyEndpoint> {
        if self.proxies.is_empty() {
            return None;
        }
        self.proxies.get(worker_index % self.proxies.len())
    }
}
