//! Domain types for the fill harvester.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, Address, Coin
//! - Fill records as reported by the exchange, and their direction tags
//! - Completed trades derived from fills
//! - Egress identities (proxies)
//! - Stable fill ordering key helper for deterministic processing

pub mod decimal;
pub mod fill;
pub mod ordering;
pub mod primitives;
pub mod proxy;
pub mod trade;

pub use decimal::Decimal;
pub use fill::{Fill, FillDirection, FillValueError};
pub use ordering::FillOrderingKey;
pub use primitives::{Address, AddressParseError, Coin, TimeMs};
pub use proxy::ProxyEndpoint;
pub use trade::{CompletedTrade, MarginMode, TradeDirection};
