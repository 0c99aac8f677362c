//! Materialisation of derived tables from stored fills.
//!
//! Completed trades are a view over fills: a rebuild recomputes an address's
//! trades from its whole history and swaps them in atomically.

pub mod rebuild;

pub use rebuild::{RebuildError, RebuildReport, TradeRebuilder};
