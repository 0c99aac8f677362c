//! Adaptive range fetcher.
//!
//! The fills endpoint silently truncates any response at a fixed page size.
//! A range whose page comes back full is therefore re-fetched as smaller
//! calendar buckets (month, week, day, hour, ten minutes) until every bucket
//! fits in one page. The ten-minute bucket is the floor.

use crate::datasource::{DataSource, DataSourceError, FILLS_PAGE_LIMIT};
use crate::domain::{Address, Fill, TimeMs};
use chrono::{DateTime, Months};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Calendar unit used to split a truncated range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Granularity {
    Month,
    Week,
    Day,
    Hour,
    TenMinutes,
}

impl Granularity {
    /// Next finer level, or `None` at the floor.
    pub fn finer(self) -> Option<Granularity> {
        match self {
            Granularity::Month => Some(Granularity::Week),
            Granularity::Week => Some(Granularity::Day),
            Granularity::Day => Some(Granularity::Hour),
            Granularity::Hour => Some(Granularity::TenMinutes),
            Granularity::TenMinutes => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Granularity::Month => "month",
            Granularity::Week => "week",
            Granularity::Day => "day",
            Granularity::Hour => "hour",
            Granularity::TenMinutes => "10min",
        }
    }

    /// Start of the bucket following the one that starts at `from_ms`.
    ///
    /// Months are calendar months in UTC (Jan 31 + 1 month = Feb 29 in a leap year).
    fn next_boundary(self, from_ms: i64) -> i64 {
        let next = match self {
            Granularity::Month => DateTime::from_timestamp_millis(from_ms)
                .and_then(|dt| dt.checked_add_months(Months::new(1)))
                .map(|dt| dt.timestamp_millis())
                .unwrap_or_else(|| from_ms.saturating_add(30 * DAY_MS)),
            Granularity::Week => from_ms.saturating_add(7 * DAY_MS),
            Granularity::Day => from_ms.saturating_add(DAY_MS),
            Granularity::Hour => from_ms.saturating_add(HOUR_MS),
            Granularity::TenMinutes => from_ms.saturating_add(10 * MINUTE_MS),
        };
        // always advance, even at the edge of the representable range
        next.max(from_ms.saturating_add(1))
    }

    /// Split `[start_ms, end_ms)` into consecutive half-open buckets of this size.
    ///
    /// Buckets are anchored at `start_ms` and the last one is clamped to `end_ms`,
    /// so the result tiles the input exactly.
    pub fn split(self, start_ms: i64, end_ms: i64) -> Vec<(i64, i64)> {
        let mut buckets = Vec::new();
        let mut cur = start_ms;
        while cur < end_ms {
            let next = self.next_boundary(cur).min(end_ms);
            buckets.push((cur, next));
            cur = next;
        }
        buckets
    }
}

/// One pending range on the work list.
#[derive(Debug, Clone, Copy)]
struct Bucket {
    start_ms: i64,
    end_ms: i64,
    granularity: Granularity,
}

/// Result of harvesting one range.
#[derive(Debug, Clone, Default)]
pub struct RangeHarvest {
    /// Fills in tiling order (chronological by bucket).
    pub fills: Vec<Fill>,
    /// Leaf ranges that were accepted, failed or hit the floor, in order.
    /// Together they tile the requested range.
    pub buckets: Vec<(i64, i64)>,
    /// Network calls issued, probe included.
    pub requests: usize,
    /// Buckets whose request failed and contributed nothing.
    pub failed_buckets: usize,
    /// Ten-minute buckets still at the page ceiling, accepted as-is.
    pub saturated_buckets: usize,
}

/// Fetches every fill of an address in a time range through one client.
#[derive(Debug, Clone)]
pub struct RangeFetcher {
    client: Arc<dyn DataSource>,
    delay: Duration,
    page_limit: usize,
}

impl RangeFetcher {
    /// Create a fetcher that sleeps `delay` before every network call.
    pub fn new(client: Arc<dyn DataSource>, delay: Duration) -> Self {
        Self {
            client,
            delay,
            page_limit: FILLS_PAGE_LIMIT,
        }
    }

    /// Override the page ceiling (defaults to [`FILLS_PAGE_LIMIT`]).
    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    pub fn page_limit(&self) -> usize {
        self.page_limit
    }

    /// Harvest every fill of `address` in `[start_ms, end_ms)`.
    ///
    /// A single probe covers the whole range first. If the probe fails the
    /// range is abandoned and the error returned; nothing partial comes back.
    /// Once the probe succeeds, failures are confined to their own bucket:
    /// the bucket contributes no fills and its siblings carry on.
    ///
    /// # Errors
    /// Returns the probe's error.
    pub async fn harvest(
        &self,
        address: &Address,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<RangeHarvest, DataSourceError> {
        let mut result = RangeHarvest::default();
        if start_ms >= end_ms {
            return Ok(result);
        }

        let probe = self.fetch(address, start_ms, end_ms, &mut result).await?;
        if !self.is_saturated(&probe) {
            result.fills = probe;
            result.buckets.push((start_ms, end_ms));
            return Ok(result);
        }

        info!(
            "{}: page limit {} hit for {} .. {}, splitting by month",
            address.short(),
            self.page_limit,
            TimeMs::new(start_ms),
            TimeMs::new(end_ms)
        );

        // Depth-first work list. Children are pushed in reverse so the
        // earliest bucket is popped first and output stays chronological.
        let mut stack: Vec<Bucket> = Vec::new();
        push_children(&mut stack, start_ms, end_ms, Granularity::Month);

        while let Some(bucket) = stack.pop() {
            let page = match self
                .fetch(address, bucket.start_ms, bucket.end_ms, &mut result)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    log_bucket_failure(address, &bucket, &e);
                    result.failed_buckets += 1;
                    result.buckets.push((bucket.start_ms, bucket.end_ms));
                    continue;
                }
            };

            if !self.is_saturated(&page) {
                result.fills.extend(page);
                result.buckets.push((bucket.start_ms, bucket.end_ms));
                continue;
            }

            match bucket.granularity.finer() {
                Some(finer) => {
                    debug!(
                        "{}: {} bucket {} hit limit, splitting by {}",
                        address.short(),
                        bucket.granularity.label(),
                        TimeMs::new(bucket.start_ms),
                        finer.label()
                    );
                    push_children(&mut stack, bucket.start_ms, bucket.end_ms, finer);
                }
                None => {
                    warn!(
                        "{}: {} bucket {} still at limit ({} fills), cannot split further",
                        address.short(),
                        bucket.granularity.label(),
                        TimeMs::new(bucket.start_ms),
                        page.len()
                    );
                    result.saturated_buckets += 1;
                    result.fills.extend(page);
                    result.buckets.push((bucket.start_ms, bucket.end_ms));
                }
            }
        }

        Ok(result)
    }

    async fn fetch(
        &self,
        address: &Address,
        start_ms: i64,
        end_ms: i64,
        result: &mut RangeHarvest,
    ) -> Result<Vec<Fill>, DataSourceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        result.requests += 1;
        self.client
            .fetch_fills_by_time(address.as_str(), start_ms, end_ms)
            .await
    }

    fn is_saturated(&self, page: &[Fill]) -> bool {
        page.len() >= self.page_limit
    }
}

fn push_children(stack: &mut Vec<Bucket>, start_ms: i64, end_ms: i64, granularity: Granularity) {
    let children = granularity.split(start_ms, end_ms);
    stack.extend(children.into_iter().rev().map(|(s, e)| Bucket {
        start_ms: s,
        end_ms: e,
        granularity,
    }));
}

fn log_bucket_failure(address: &Address, bucket: &Bucket, err: &DataSourceError) {
    if err.is_rate_limited() {
        warn!(
            "{}: rate limited on {} bucket {}, skipping",
            address.short(),
            bucket.granularity.label(),
            TimeMs::new(bucket.start_ms)
        );
    } else {
        warn!(
            "{}: {} bucket {} failed: {}",
            address.short(),
            bucket.granularity.label(),
            TimeMs::new(bucket.start_ms),
            err
        );
    }
}
