//! Completed trade rebuilds.

use crate::db::Repository;
use crate::domain::Address;
use crate::engine::TradeReconstructor;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RebuildError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// What a rebuild of one address produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub fills: usize,
    pub trades: usize,
    pub orphan_closes: usize,
    pub skipped_fills: usize,
    pub open_positions: usize,
}

/// Rebuilds completed trades from persisted fills.
pub struct TradeRebuilder;

impl TradeRebuilder {
    /// Replace all completed trades of `address` with a fresh reconstruction.
    ///
    /// # Arguments
    /// * `repo` - Database repository
    /// * `address` - Address to rebuild
    ///
    /// # Errors
    /// Returns an error if loading fills or the replacement transaction fails.
    /// On error the previously stored trades are left untouched.
    pub async fn rebuild(
        repo: &Repository,
        address: &Address,
    ) -> Result<RebuildReport, RebuildError> {
        let fills = repo.load_all_fills(address).await?;
        let reconstruction = TradeReconstructor::reconstruct(address, &fills);

        // an empty set still clears stale trades
        let trades = repo
            .replace_completed_trades(address, &reconstruction.trades)
            .await?;

        if reconstruction.skipped_fills > 0 {
            warn!(
                "{}: {} fills skipped (unparseable values)",
                address.short(),
                reconstruction.skipped_fills
            );
        }
        info!(
            "{}: rebuilt {} completed trades from {} fills",
            address.short(),
            trades,
            fills.len()
        );

        Ok(RebuildReport {
            fills: fills.len(),
            trades,
            orphan_closes: reconstruction.orphan_closes,
            skipped_fills: reconstruction.skipped_fills,
            open_positions: reconstruction.open_positions,
        })
    }

    /// Rebuild every address in `addresses`, continuing past failures.
    ///
    /// Returns the number of addresses rebuilt successfully.
    pub async fn rebuild_all(repo: &Repository, addresses: &[Address]) -> usize {
        let mut rebuilt = 0usize;
        for address in addresses {
            match Self::rebuild(repo, address).await {
                Ok(_) => rebuilt += 1,
                Err(e) => warn!("{}: rebuild failed: {}", address.short(), e),
            }
        }
        info!("Rebuilt trades for {}/{} addresses", rebuilt, addresses.len());
        rebuilt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use crate::domain::{Coin, Fill, MarginMode, TimeMs};
    use tempfile::TempDir;

    async fn setup_repo() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn make_fill(user: &Address, dir: &str, px: &str, sz: &str, time_ms: i64, tid: i64) -> Fill {
        Fill {
            address: user.clone(),
            coin: Coin::new("BTC".to_string()),
            px: px.to_string(),
            sz: sz.to_string(),
            side: "B".to_string(),
            time_ms: TimeMs::new(time_ms),
            start_position: "0".to_string(),
            dir: dir.to_string(),
            closed_pnl: "0".to_string(),
            fee: "0".to_string(),
            fee_token: "USDC".to_string(),
            hash: String::new(),
            oid: tid,
            cloid: None,
            crossed: tid == 1,
            tid,
        }
    }

    #[tokio::test]
    async fn test_rebuild_from_stored_fills() {
        let (repo, _temp) = setup_repo().await;
        let user = Address::new("0xabc".to_string());
        repo.insert_fills_batch(&[
            make_fill(&user, "Open Long", "100", "10", 1_000, 1),
            make_fill(&user, "Close Long", "110", "4", 2_000, 2),
            make_fill(&user, "Close Long", "120", "6", 3_000, 3),
            make_fill(&user, "Close Long", "120", "6", 4_000, 4),
        ])
        .await
        .unwrap();

        let report = TradeRebuilder::rebuild(&repo, &user).await.unwrap();
        assert_eq!(report.fills, 4);
        assert_eq!(report.trades, 1);
        assert_eq!(report.orphan_closes, 1);

        let trades = repo.query_completed_trades(&user, None).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].close_price.to_canonical_string(), "116");
        assert_eq!(trades[0].margin_mode, MarginMode::Cross);
    }

    #[tokio::test]
    async fn test_rebuild_is_repeatable() {
        let (repo, _temp) = setup_repo().await;
        let user = Address::new("0xabc".to_string());
        repo.insert_fills_batch(&[
            make_fill(&user, "Open Long", "100", "1", 1_000, 1),
            make_fill(&user, "Close Long", "110", "1", 2_000, 2),
        ])
        .await
        .unwrap();

        TradeRebuilder::rebuild(&repo, &user).await.unwrap();
        let first = repo.query_completed_trades(&user, None).await.unwrap();
        TradeRebuilder::rebuild(&repo, &user).await.unwrap();
        let second = repo.query_completed_trades(&user, None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.len(), 1);
    }

    #[tokio::test]
    async fn test_rebuild_all_counts_addresses() {
        let (repo, _temp) = setup_repo().await;
        let a = Address::new("0xaaa".to_string());
        let b = Address::new("0xbbb".to_string());

        let rebuilt = TradeRebuilder::rebuild_all(&repo, &[a, b]).await;
        assert_eq!(rebuilt, 2);
    }
}
