//! Fill harvesting.
//!
//! This module provides:
//! - `RangeFetcher`: complete retrieval of one address's fills over a time
//!   range through a page-capped endpoint
//! - `HarvestPool`: concurrent workers with per-worker egress identity and
//!   incremental resumption

pub mod fetcher;
pub mod pool;

pub use fetcher::{Granularity, RangeFetcher, RangeHarvest};
pub use pool::{AddressOutcome, HarvestConfig, HarvestError, HarvestPool, HarvestSummary};
