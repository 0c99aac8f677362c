//! Fill type representing a single trade execution.

use crate::domain::{Address, Coin, Decimal, TimeMs, TradeDirection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single trade fill/execution, as reported by the exchange.
///
/// Numeric fields keep the exchange's decimal strings verbatim so that a
/// malformed value never prevents the fill from being stored; they are parsed
/// on demand during trade reconstruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    /// Account the fill belongs to.
    pub address: Address,
    /// Instrument traded.
    pub coin: Coin,
    /// Execution price.
    pub px: String,
    /// Executed size.
    pub sz: String,
    /// Book side tag (`B` bid / `A` ask).
    pub side: String,
    /// Time of the fill in milliseconds since Unix epoch.
    pub time_ms: TimeMs,
    /// Signed position size before this fill.
    pub start_position: String,
    /// Direction tag, e.g. `Open Long` or `Close Short`.
    pub dir: String,
    /// Realized PnL carried on this fill.
    pub closed_pnl: String,
    /// Fee charged for this fill.
    pub fee: String,
    /// Token the fee was charged in.
    pub fee_token: String,
    /// Exchange transaction hash.
    pub hash: String,
    /// Order ID.
    pub oid: i64,
    /// Client order ID, when the order carried one.
    pub cloid: Option<String>,
    /// True when the fill was a cross-margin (taker) execution.
    pub crossed: bool,
    /// Globally unique trade ID; the natural key for deduplication.
    pub tid: i64,
}

impl Fill {
    /// Parsed direction tag.
    pub fn direction(&self) -> FillDirection {
        FillDirection::from_tag(&self.dir)
    }

    pub fn px_decimal(&self) -> Result<Decimal, FillValueError> {
        parse_field("px", &self.px)
    }

    pub fn sz_decimal(&self) -> Result<Decimal, FillValueError> {
        parse_field("sz", &self.sz)
    }

    pub fn fee_decimal(&self) -> Result<Decimal, FillValueError> {
        parse_field("fee", &self.fee)
    }

    /// Realized PnL; an empty string counts as zero.
    pub fn closed_pnl_decimal(&self) -> Result<Decimal, FillValueError> {
        if self.closed_pnl.trim().is_empty() {
            return Ok(Decimal::zero());
        }
        parse_field("closedPnl", &self.closed_pnl)
    }
}

fn parse_field(field: &'static str, raw: &str) -> Result<Decimal, FillValueError> {
    Decimal::from_str_canonical(raw.trim()).map_err(|_| FillValueError {
        field,
        value: raw.to_string(),
    })
}

/// A numeric fill field that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparseable {field}: {value:?}")]
pub struct FillValueError {
    pub field: &'static str,
    pub value: String,
}

/// Position effect of a fill, decoded from its `dir` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillDirection {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    /// Any other tag (spot trades, flips, liquidations, settlements, ...).
    Other,
}

impl FillDirection {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "Open Long" => FillDirection::OpenLong,
            "Open Short" => FillDirection::OpenShort,
            "Close Long" => FillDirection::CloseLong,
            "Close Short" => FillDirection::CloseShort,
            _ => FillDirection::Other,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, FillDirection::OpenLong | FillDirection::OpenShort)
    }

    pub fn is_close(&self) -> bool {
        matches!(self, FillDirection::CloseLong | FillDirection::CloseShort)
    }

    /// Position side this fill opens or closes.
    pub fn trade_direction(&self) -> Option<TradeDirection> {
        match self {
            FillDirection::OpenLong | FillDirection::CloseLong => Some(TradeDirection::Long),
            FillDirection::OpenShort | FillDirection::CloseShort => Some(TradeDirection::Short),
            FillDirection::Other => None,
        }
    }
}

impl fmt::Display for FillDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FillDirection::OpenLong => "Open Long",
            FillDirection::OpenShort => "Open Short",
            FillDirection::CloseLong => "Close Long",
            FillDirection::CloseShort => "Close Short",
            FillDirection::Other => "Other",
        };
        write!(f, "{}", tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fill(dir: &str, px: &str, closed_pnl: &str) -> Fill {
        Fill {
            address: Address::new("0x123".to_string()),
            coin: Coin::new("BTC".to_string()),
            px: px.to_string(),
            sz: "1.5".to_string(),
            side: "B".to_string(),
            time_ms: TimeMs::new(1000),
            start_position: "0".to_string(),
            dir: dir.to_string(),
            closed_pnl: closed_pnl.to_string(),
            fee: "0.25".to_string(),
            fee_token: "USDC".to_string(),
            hash: "0xabc".to_string(),
            oid: 7,
            cloid: None,
            crossed: true,
            tid: 42,
        }
    }

    #[test]
    fn test_direction_tags() {
        assert_eq!(FillDirection::from_tag("Open Long"), FillDirection::OpenLong);
        assert_eq!(FillDirection::from_tag("Open Short"), FillDirection::OpenShort);
        assert_eq!(FillDirection::from_tag("Close Long"), FillDirection::CloseLong);
        assert_eq!(FillDirection::from_tag("Close Short"), FillDirection::CloseShort);
        assert_eq!(FillDirection::from_tag("Long > Short"), FillDirection::Other);
        assert_eq!(FillDirection::from_tag("Buy"), FillDirection::Other);
        assert_eq!(FillDirection::from_tag(""), FillDirection::Other);
    }

    #[test]
    fn test_direction_predicates() {
        assert!(FillDirection::OpenShort.is_open());
        assert!(!FillDirection::OpenShort.is_close());
        assert!(FillDirection::CloseLong.is_close());
        assert!(!FillDirection::Other.is_open() && !FillDirection::Other.is_close());
        assert_eq!(
            FillDirection::CloseShort.trade_direction(),
            Some(TradeDirection::Short)
        );
        assert_eq!(FillDirection::Other.trade_direction(), None);
    }

    #[test]
    fn test_numeric_accessors() {
        let fill = make_fill("Open Long", "50000.5", "");
        assert_eq!(fill.px_decimal().unwrap().to_canonical_string(), "50000.5");
        assert_eq!(fill.sz_decimal().unwrap().to_canonical_string(), "1.5");
        assert_eq!(fill.fee_decimal().unwrap().to_canonical_string(), "0.25");
        assert!(fill.closed_pnl_decimal().unwrap().is_zero());
        assert_eq!(fill.direction(), FillDirection::OpenLong);
    }

    #[test]
    fn test_unparseable_px_reports_field() {
        let fill = make_fill("Open Long", "NaN?", "0");
        let err = fill.px_decimal().unwrap_err();
        assert_eq!(err.field, "px");
        assert_eq!(err.value, "NaN?");
    }

    #[test]
    fn test_fill_serialization_roundtrip() {
        let fill = make_fill("Close Long", "100", "12.5");
        let json = serde_json::to_value(&fill).unwrap();
        assert_eq!(json["timeMs"], 1000);
        assert_eq!(json["closedPnl"], "12.5");
        let back: Fill = serde_json::from_value(json).unwrap();
        assert_eq!(back, fill);
    }
}
