//! Stable fill ordering for deterministic processing.

use crate::domain::Fill;

/// Stable ordering key for fills.
///
/// Ordering: time_ms -> tid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FillOrderingKey {
    /// Time in milliseconds (primary sort).
    pub time_ms: i64,
    /// Trade ID (tie-breaker).
    pub tid: i64,
}

impl FillOrderingKey {
    /// Create an ordering key from a Fill.
    pub fn from_fill(fill: &Fill) -> Self {
        FillOrderingKey {
            time_ms: fill.time_ms.as_i64(),
            tid: fill.tid,
        }
    }
}

/// Sort fills deterministically.
pub fn sort_fills_deterministic(fills: &mut [Fill]) {
    fills.sort_by_key(FillOrderingKey::from_fill);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Coin, TimeMs};

    fn make_fill(time_ms: i64, tid: i64) -> Fill {
        Fill {
            address: Address::new("0x123".to_string()),
            coin: Coin::new("BTC".to_string()),
            px: "100".to_string(),
            sz: "1".to_string(),
            side: "B".to_string(),
            time_ms: TimeMs::new(time_ms),
            start_position: "0".to_string(),
            dir: "Open Long".to_string(),
            closed_pnl: "0".to_string(),
            fee: "0".to_string(),
            fee_token: "USDC".to_string(),
            hash: String::new(),
            oid: 1,
            cloid: None,
            crossed: false,
            tid,
        }
    }

    #[test]
    fn test_sort_by_time_then_tid() {
        let mut fills = vec![make_fill(2000, 1), make_fill(1000, 9), make_fill(1000, 3)];
        sort_fills_deterministic(&mut fills);
        let order: Vec<(i64, i64)> = fills.iter().map(|f| (f.time_ms.as_i64(), f.tid)).collect();
        assert_eq!(order, vec![(1000, 3), (1000, 9), (2000, 1)]);
    }
}
