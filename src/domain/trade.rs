//! Completed round-trip trades derived from fills.

use crate::domain::{Address, Coin, Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Margin mode of an account's positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarginMode {
    Isolated,
    Cross,
}

impl MarginMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginMode::Isolated => "isolated",
            MarginMode::Cross => "cross",
        }
    }
}

impl fmt::Display for MarginMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarginMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "isolated" => Ok(MarginMode::Isolated),
            "cross" => Ok(MarginMode::Cross),
            other => Err(format!("unknown margin mode: {}", other)),
        }
    }
}

/// Side of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Long => "long",
            TradeDirection::Short => "short",
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long" => Ok(TradeDirection::Long),
            "short" => Ok(TradeDirection::Short),
            other => Err(format!("unknown trade direction: {}", other)),
        }
    }
}

/// A closed position: every fill from the first open until size returned to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTrade {
    pub address: Address,
    pub coin: Coin,
    pub margin_mode: MarginMode,
    pub direction: TradeDirection,
    /// Peak position size reached during the trade.
    pub size: Decimal,
    /// Volume-weighted entry price.
    pub entry_price: Decimal,
    /// Volume-weighted close price.
    pub close_price: Decimal,
    pub start_time_ms: TimeMs,
    pub end_time_ms: TimeMs,
    pub total_fee: Decimal,
    /// Sum of realized PnL carried on the trade's fills.
    pub pnl: Decimal,
    pub fill_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_mode_strings() {
        assert_eq!(MarginMode::Cross.to_string(), "cross");
        assert_eq!("isolated".parse::<MarginMode>(), Ok(MarginMode::Isolated));
        assert!("portfolio".parse::<MarginMode>().is_err());
    }

    #[test]
    fn test_trade_direction_strings() {
        assert_eq!(TradeDirection::Short.as_str(), "short");
        assert_eq!("long".parse::<TradeDirection>(), Ok(TradeDirection::Long));
        assert_eq!(
            serde_json::to_string(&TradeDirection::Long).unwrap(),
            "\"long\""
        );
    }
}
