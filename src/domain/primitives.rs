//! Domain primitives: TimeMs, Address, Coin.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Alias of [`TimeMs::as_i64`].
    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for TimeMs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match chrono::DateTime::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

/// Wallet address (hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string.
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form used in log lines (`0x12345678`).
    pub fn short(&self) -> &str {
        self.0.get(..10).unwrap_or(&self.0)
    }

    /// Parse a user-supplied `0x`-prefixed hex address.
    pub fn parse(addr: &str) -> Result<Self, AddressParseError> {
        let hex_part = addr
            .strip_prefix("0x")
            .ok_or_else(|| AddressParseError(addr.to_string()))?;
        if hex_part.is_empty()
            || hex_part.len() > 40
            || !hex_part.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(AddressParseError(addr.to_string()));
        }
        Ok(Address(addr.to_lowercase()))
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rejected address input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid address: {0}")]
pub struct AddressParseError(pub String);

/// Coin/asset symbol (e.g., "BTC", "ETH").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coin(pub String);

impl Coin {
    /// Create a Coin from a string.
    pub fn new(coin: String) -> Self {
        Coin(coin)
    }

    /// Get the coin as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Coin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
