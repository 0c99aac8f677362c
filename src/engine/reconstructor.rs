//! Completed-trade reconstruction.
//!
//! Replays an address's fills coin by coin. A trade starts with the first
//! open fill on a flat coin and ends on the close that brings its size back
//! to zero. Sizes, prices and fees are summed exactly and rounded only when
//! the trade is emitted.

use crate::domain::ordering::sort_fills_deterministic;
use crate::domain::{
    Address, Coin, CompletedTrade, Decimal, Fill, FillDirection, FillValueError, MarginMode,
    TimeMs, TradeDirection,
};
use std::collections::BTreeMap;
use tracing::warn;

/// Fractional digits kept for sizes and prices.
pub const PRICE_DP: u32 = 8;
/// Fractional digits kept for fees and PnL.
pub const MONEY_DP: u32 = 6;

/// Open position for one coin during a single reconstruction pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionState {
    pub direction: TradeDirection,
    /// Current absolute size.
    pub size: Decimal,
    pub peak_size: Decimal,
    pub open_notional: Decimal,
    pub open_size: Decimal,
    pub close_notional: Decimal,
    pub close_size: Decimal,
    pub fees: Decimal,
    pub realized_pnl: Decimal,
    pub opened_at: TimeMs,
    pub closed_at: TimeMs,
    pub fill_count: i64,
}

impl PositionState {
    fn open(direction: TradeDirection, time_ms: TimeMs) -> Self {
        Self {
            direction,
            size: Decimal::zero(),
            peak_size: Decimal::zero(),
            open_notional: Decimal::zero(),
            open_size: Decimal::zero(),
            close_notional: Decimal::zero(),
            close_size: Decimal::zero(),
            fees: Decimal::zero(),
            realized_pnl: Decimal::zero(),
            opened_at: time_ms,
            closed_at: time_ms,
            fill_count: 0,
        }
    }

    /// Sizes are exact decimals, so a position is flat once nothing is left.
    /// Closing more than is open also ends the position.
    pub fn is_flat(&self) -> bool {
        !self.size.is_positive()
    }

    fn add_open(&mut self, values: &FillValues) {
        self.size += values.sz;
        if self.size > self.peak_size {
            self.peak_size = self.size;
        }
        self.open_notional += values.px * values.sz;
        self.open_size += values.sz;
        self.fees += values.fee;
        self.realized_pnl += values.closed_pnl;
        self.fill_count += 1;
    }

    fn add_close(&mut self, values: &FillValues, time_ms: TimeMs) {
        self.size -= values.sz;
        self.close_notional += values.px * values.sz;
        self.close_size += values.sz;
        self.fees += values.fee;
        self.realized_pnl += values.closed_pnl;
        self.closed_at = time_ms;
        self.fill_count += 1;
    }

    fn into_trade(self, address: &Address, coin: &Coin, margin_mode: MarginMode) -> CompletedTrade {
        CompletedTrade {
            address: address.clone(),
            coin: coin.clone(),
            margin_mode,
            direction: self.direction,
            size: self.peak_size.round_dp(PRICE_DP),
            entry_price: self.open_notional.div_or_zero(self.open_size).round_dp(PRICE_DP),
            close_price: self
                .close_notional
                .div_or_zero(self.close_size)
                .round_dp(PRICE_DP),
            start_time_ms: self.opened_at,
            end_time_ms: self.closed_at,
            total_fee: self.fees.round_dp(MONEY_DP),
            pnl: self.realized_pnl.round_dp(MONEY_DP),
            fill_count: self.fill_count,
        }
    }
}

/// Parsed numeric fields of one fill.
struct FillValues {
    px: Decimal,
    sz: Decimal,
    fee: Decimal,
    closed_pnl: Decimal,
}

impl FillValues {
    fn parse(fill: &Fill) -> Result<Self, FillValueError> {
        Ok(Self {
            px: fill.px_decimal()?,
            sz: fill.sz_decimal()?.abs(),
            fee: fill.fee_decimal()?,
            closed_pnl: fill.closed_pnl_decimal()?,
        })
    }
}

/// Output of one reconstruction pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    pub trades: Vec<CompletedTrade>,
    /// Close fills seen while no position was open.
    pub orphan_closes: usize,
    /// Fills with an unparseable numeric field.
    pub skipped_fills: usize,
    /// Fills tagged neither open nor close.
    pub ignored_fills: usize,
    /// Positions still open at the end of the history.
    pub open_positions: usize,
}

/// Replays an address's fills through a per-coin position state machine.
pub struct TradeReconstructor;

impl TradeReconstructor {
    /// Rebuild the completed trades of `address` from its full fill history.
    ///
    /// Fills are grouped by coin and replayed in `(time_ms, tid)` order, so the
    /// input order does not matter. Margin mode is `cross` for every trade if
    /// any fill of the address is crossed, otherwise `isolated`.
    pub fn reconstruct(address: &Address, fills: &[Fill]) -> Reconstruction {
        let margin_mode = if fills.iter().any(|f| f.crossed) {
            MarginMode::Cross
        } else {
            MarginMode::Isolated
        };

        let mut by_coin: BTreeMap<&Coin, Vec<Fill>> = BTreeMap::new();
        for fill in fills {
            by_coin.entry(&fill.coin).or_default().push(fill.clone());
        }

        let mut out = Reconstruction::default();
        for (coin, mut coin_fills) in by_coin {
            sort_fills_deterministic(&mut coin_fills);
            Self::replay_coin(address, coin, margin_mode, &coin_fills, &mut out);
        }

        out.trades
            .sort_by(|a, b| (a.start_time_ms, &a.coin).cmp(&(b.start_time_ms, &b.coin)));
        out
    }

    fn replay_coin(
        address: &Address,
        coin: &Coin,
        margin_mode: MarginMode,
        fills: &[Fill],
        out: &mut Reconstruction,
    ) {
        let mut state: Option<PositionState> = None;

        for fill in fills {
            let direction = fill.direction();
            if !direction.is_open() && !direction.is_close() {
                out.ignored_fills += 1;
                continue;
            }

            let values = match FillValues::parse(fill) {
                Ok(values) => values,
                Err(e) => {
                    warn!(
                        "{}: skipping fill tid={} ({}): {}",
                        address.short(),
                        fill.tid,
                        coin,
                        e
                    );
                    out.skipped_fills += 1;
                    continue;
                }
            };

            match direction {
                FillDirection::OpenLong | FillDirection::OpenShort => {
                    if let Some(side) = direction.trade_direction() {
                        state
                            .get_or_insert_with(|| PositionState::open(side, fill.time_ms))
                            .add_open(&values);
                    }
                }
                FillDirection::CloseLong | FillDirection::CloseShort => {
                    let Some(position) = state.as_mut() else {
                        out.orphan_closes += 1;
                        continue;
                    };
                    position.add_close(&values, fill.time_ms);

                    if position.is_flat() {
                        if let Some(done) = state.take() {
                            out.trades.push(done.into_trade(address, coin, margin_mode));
                        }
                    }
                }
                FillDirection::Other => {}
            }
        }

        if state.is_some() {
            out.open_positions += 1;
        }
    }
}
