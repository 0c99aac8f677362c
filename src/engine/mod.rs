//! Pure computation engine for trade reconstruction.

pub mod reconstructor;

pub use reconstructor::{PositionState, Reconstruction, TradeReconstructor, MONEY_DP, PRICE_DP};
