//! Harvest worker pool.
//!
//! A fixed number of workers drain a queue of addresses. Each worker owns one
//! network client bound to one egress identity for the whole run, resumes
//! every address from its newest stored fill and writes what it fetched in
//! idempotent batches.

use crate::config::DEFAULT_START_MS;
use crate::datasource::{DataSourceError, DataSourceFactory, FILLS_PAGE_LIMIT};
use crate::db::Repository;
use crate::domain::{Address, Fill, TimeMs};
use crate::harvest::fetcher::RangeFetcher;
use crate::proxy::ProxyDirectory;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

/// Tunables for one harvest run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Number of concurrent workers (at least 1).
    pub workers: usize,
    /// Sleep before every network call. Zero disables it.
    pub request_delay: Duration,
    /// Lower bound for addresses with no stored fill.
    pub default_start_ms: i64,
    /// Fills per persistence transaction.
    pub batch_size: usize,
    /// Log progress every this many completed addresses.
    pub progress_every: u64,
    /// Page ceiling of the fills endpoint.
    pub page_limit: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            request_delay: Duration::from_millis(200),
            default_start_ms: DEFAULT_START_MS,
            batch_size: 500,
            progress_every: 50,
            page_limit: FILLS_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error(transparent)]
    DataSource(#[from] DataSourceError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// What happened to one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressOutcome {
    /// The stored history already reaches the present.
    Current,
    Harvested { fetched: usize, saved: usize },
}

/// Counters shared by every worker of a run.
#[derive(Debug, Default)]
struct HarvestCounters {
    done: AtomicU64,
    fills_saved: AtomicU64,
    failed: AtomicU64,
    skipped_current: AtomicU64,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub total: u64,
    pub processed: u64,
    pub fills_saved: u64,
    pub failed: u64,
    pub skipped_current: u64,
    /// Addresses processed by each worker, indexed by worker.
    pub per_worker: Vec<u64>,
}

impl HarvestSummary {
    /// Addresses left in the queue because no worker could take them.
    pub fn unreached(&self) -> u64 {
        self.total.saturating_sub(self.processed)
    }
}

#[derive(Clone)]
pub struct HarvestPool {
    repo: Arc<Repository>,
    factory: Arc<dyn DataSourceFactory>,
    proxies: ProxyDirectory,
    config: HarvestConfig,
}

impl HarvestPool {
    pub fn new(
        repo: Arc<Repository>,
        factory: Arc<dyn DataSourceFactory>,
        proxies: ProxyDirectory,
        config: HarvestConfig,
    ) -> Self {
        Self {
            repo,
            factory,
            proxies,
            config,
        }
    }

    /// Harvest every address in `addresses` and return the run totals.
    ///
    /// The queue is filled once and closed; workers exit when it is drained.
    /// Per-address failures are logged and counted, never propagated.
    pub async fn run(&self, addresses: Vec<Address>) -> HarvestSummary {
        let total = addresses.len() as u64;
        let workers = self.config.workers.max(1);
        info!(
            "Harvesting {} addresses with {} workers ({} proxies)",
            total,
            workers,
            self.proxies.len()
        );

        let (tx, rx) = mpsc::channel(addresses.len().max(1));
        for address in addresses {
            // capacity covers every address, so this never waits
            if tx.send(address).await.is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let counters = Arc::new(HarvestCounters::default());

        let handles: Vec<_> = (0..workers)
            .map(|worker_index| {
                let pool = self.clone();
                let queue = queue.clone();
                let counters = counters.clone();
                tokio::spawn(async move { pool.worker(worker_index, queue, counters, total).await })
            })
            .collect();

        let mut per_worker = Vec::with_capacity(workers);
        for (worker_index, result) in futures::future::join_all(handles)
            .await
            .into_iter()
            .enumerate()
        {
            match result {
                Ok(processed) => per_worker.push(processed),
                Err(e) => {
                    error!("Worker {} aborted: {}", worker_index, e);
                    per_worker.push(0);
                }
            }
        }

        let summary = HarvestSummary {
            total,
            processed: counters.done.load(Ordering::SeqCst),
            fills_saved: counters.fills_saved.load(Ordering::SeqCst),
            failed: counters.failed.load(Ordering::SeqCst),
            skipped_current: counters.skipped_current.load(Ordering::SeqCst),
            per_worker,
        };
        if summary.unreached() > 0 {
            error!(
                "Queue not drained: {} of {} addresses never reached a worker",
                summary.unreached(),
                summary.total
            );
        }
        info!(
            "Harvest done: {}/{} addresses processed, {} fills saved, {} failed, {} already current",
            summary.processed,
            summary.total,
            summary.fills_saved,
            summary.failed,
            summary.skipped_current
        );
        summary
    }

    async fn worker(
        &self,
        worker_index: usize,
        queue: Arc<Mutex<mpsc::Receiver<Address>>>,
        counters: Arc<HarvestCounters>,
        total: u64,
    ) -> u64 {
        let proxy = self.proxies.for_worker(worker_index);
        let client = match self.factory.build(proxy) {
            Ok(client) => client,
            Err(e) => {
                error!("Worker {}: cannot build client: {}", worker_index, e);
                return 0;
            }
        };
        match proxy {
            Some(p) => info!("Worker {} using proxy {}", worker_index, p.redacted()),
            None => info!("Worker {} using direct connection", worker_index),
        }

        let fetcher = RangeFetcher::new(client, self.config.request_delay)
            .with_page_limit(self.config.page_limit);
        let mut processed = 0u64;

        loop {
            let next = queue.lock().await.recv().await;
            let Some(address) = next else {
                break;
            };

            match self.harvest_address(&fetcher, &address).await {
                Ok(AddressOutcome::Current) => {
                    counters.skipped_current.fetch_add(1, Ordering::SeqCst);
                }
                Ok(AddressOutcome::Harvested { saved, .. }) => {
                    counters
                        .fills_saved
                        .fetch_add(saved as u64, Ordering::SeqCst);
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    match &e {
                        HarvestError::DataSource(ds) if ds.is_rate_limited() => {
                            warn!("{}: rate limited, retry next run", address.short())
                        }
                        _ => warn!("{}: harvest failed: {}", address.short(), e),
                    }
                }
            }

            processed += 1;
            let done = counters.done.fetch_add(1, Ordering::SeqCst) + 1;
            if done % self.config.progress_every.max(1) == 0 || done == total {
                info!(
                    "Progress: {}/{} addresses, {} fills saved",
                    done,
                    total,
                    counters.fills_saved.load(Ordering::SeqCst)
                );
            }
        }

        processed
    }

    /// Fetch everything newer than the stored history of `address` and persist it.
    ///
    /// # Errors
    /// Returns an error if the watermark lookup, the probe request or a
    /// persistence batch fails. Batches written before the failure stay.
    pub async fn harvest_address(
        &self,
        fetcher: &RangeFetcher,
        address: &Address,
    ) -> Result<AddressOutcome, HarvestError> {
        let lower = match self.repo.latest_fill_time(address).await? {
            Some(latest) => latest.as_i64().saturating_add(1),
            None => self.config.default_start_ms,
        };
        let upper = TimeMs::now().as_i64();
        if lower >= upper {
            return Ok(AddressOutcome::Current);
        }

        let harvest = fetcher.harvest(address, lower, upper).await?;
        let fetched = harvest.fills.len();
        if harvest.failed_buckets > 0 || harvest.saturated_buckets > 0 {
            warn!(
                "{}: {} failed and {} saturated buckets in {} requests",
                address.short(),
                harvest.failed_buckets,
                harvest.saturated_buckets,
                harvest.requests
            );
        }

        let saved = self.persist(&harvest.fills).await?;
        Ok(AddressOutcome::Harvested { fetched, saved })
    }

    /// Write fills in fixed-size batches, one transaction each.
    ///
    /// Stops at the first failing batch. Fills arrive in chronological order,
    /// so the stored watermark never moves past an unwritten fill.
    async fn persist(&self, fills: &[Fill]) -> Result<usize, sqlx::Error> {
        let mut saved = 0usize;
        for batch in fills.chunks(self.config.batch_size.max(1)) {
            saved += self.repo.insert_fills_batch(batch).await?;
        }
        Ok(saved)
    }
}
