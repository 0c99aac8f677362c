//! Fill operations for the repository.

use crate::domain::{Address, Coin, Fill, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

const FILL_COLUMNS: &str = r#"
    address, coin, px, sz, side, time_ms, start_position, dir, closed_pnl,
    hash, oid, crossed, fee, tid, cloid, fee_token
"#;

impl Repository {
    /// Insert a batch of fills in one transaction, ignoring fills whose `tid`
    /// is already stored.
    ///
    /// Returns the number of newly inserted fills (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing from the batch is kept.
    pub async fn insert_fills_batch(&self, fills: &[Fill]) -> Result<usize, sqlx::Error> {
        if fills.is_empty() {
            return Ok(0);
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut total_inserted = 0usize;

        let mut tx = self.pool.begin().await?;

        for fill in fills {
            let result = sqlx::query(
                r#"
                INSERT INTO trader_fills (
                    address, coin, px, sz, side, time_ms, start_position, dir, closed_pnl,
                    hash, oid, crossed, fee, tid, cloid, fee_token, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(tid) DO NOTHING
                "#,
            )
            .bind(fill.address.as_str())
            .bind(fill.coin.as_str())
            .bind(&fill.px)
            .bind(&fill.sz)
            .bind(&fill.side)
            .bind(fill.time_ms.as_i64())
            .bind(&fill.start_position)
            .bind(&fill.dir)
            .bind(&fill.closed_pnl)
            .bind(&fill.hash)
            .bind(fill.oid)
            .bind(fill.crossed)
            .bind(&fill.fee)
            .bind(fill.tid)
            .bind(fill.cloid.as_deref())
            .bind(&fill.fee_token)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Timestamp of the most recent stored fill for `address`, if any.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn latest_fill_time(&self, address: &Address) -> Result<Option<TimeMs>, sqlx::Error> {
        let latest: Option<i64> =
            sqlx::query_scalar("SELECT MAX(time_ms) FROM trader_fills WHERE address = ?")
                .bind(address.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(latest.map(TimeMs::new))
    }

    /// Full fill history for `address`, ordered by `(time_ms, tid)`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load_all_fills(&self, address: &Address) -> Result<Vec<Fill>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM trader_fills WHERE address = ? ORDER BY time_ms ASC, tid ASC",
            FILL_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(address.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(fill_from_row).collect()
    }

    /// Number of stored fills for `address`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count_fills(&self, address: &Address) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM trader_fills WHERE address = ?")
            .bind(address.as_str())
            .fetch_one(&self.pool)
            .await
    }
}

fn fill_from_row(row: &SqliteRow) -> Result<Fill, sqlx::Error> {
    Ok(Fill {
        address: Address::new(row.try_get("address")?),
        coin: Coin::new(row.try_get("coin")?),
        px: row.try_get("px")?,
        sz: row.try_get("sz")?,
        side: row.try_get("side")?,
        time_ms: TimeMs::new(row.try_get("time_ms")?),
        start_position: row.try_get("start_position")?,
        dir: row.try_get("dir")?,
        closed_pnl: row.try_get("closed_pnl")?,
        fee: row.try_get("fee")?,
        fee_token: row.try_get("fee_token")?,
        hash: row.try_get("hash")?,
        oid: row.try_get("oid")?,
        cloid: row.try_get("cloid")?,
        crossed: row.try_get("crossed")?,
        tid: row.try_get("tid")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations::init_db;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn make_fill(address: &str, time_ms: i64, tid: i64) -> Fill {
        Fill {
            address: Address::new(address.to_string()),
            coin: Coin::new("ETH".to_string()),
            px: "3000.5".to_string(),
            sz: "0.1".to_string(),
            side: "B".to_string(),
            time_ms: TimeMs::new(time_ms),
            start_position: "0".to_string(),
            dir: "Open Long".to_string(),
            closed_pnl: "0".to_string(),
            fee: "0.12".to_string(),
            fee_token: "USDC".to_string(),
            hash: format!("0xhash{}", tid),
            oid: tid * 10,
            cloid: Some("0xcloid".to_string()),
            crossed: true,
            tid,
        }
    }

    #[tokio::test]
    async fn test_insert_same_fill_twice_keeps_one_row() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xabc".to_string());
        let fill = make_fill("0xabc", 1000, 1);

        assert_eq!(repo.insert_fills_batch(&[fill.clone()]).await.unwrap(), 1);
        assert_eq!(repo.insert_fills_batch(&[fill.clone()]).await.unwrap(), 0);
        assert_eq!(repo.count_fills(&user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_with_internal_duplicate() {
        let (repo, _temp) = setup_test_db().await;
        let fill = make_fill("0xabc", 1000, 1);

        let inserted = repo
            .insert_fills_batch(&[fill.clone(), make_fill("0xabc", 2000, 2), fill])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
    }

    #[tokio::test]
    async fn test_latest_fill_time() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xabc".to_string());

        assert_eq!(repo.latest_fill_time(&user).await.unwrap(), None);

        repo.insert_fills_batch(&[
            make_fill("0xabc", 3000, 3),
            make_fill("0xabc", 1000, 1),
            make_fill("0xdef", 9000, 9),
        ])
        .await
        .unwrap();

        assert_eq!(
            repo.latest_fill_time(&user).await.unwrap(),
            Some(TimeMs::new(3000))
        );
    }

    #[tokio::test]
    async fn test_load_all_fills_ordered_and_lossless() {
        let (repo, _temp) = setup_test_db().await;
        let user = Address::new("0xabc".to_string());

        let late = make_fill("0xabc", 2000, 1);
        let early_high_tid = make_fill("0xabc", 1000, 7);
        let early_low_tid = make_fill("0xabc", 1000, 5);
        repo.insert_fills_batch(&[late.clone(), early_high_tid.clone(), early_low_tid.clone()])
            .await
            .unwrap();

        let fills = repo.load_all_fills(&user).await.unwrap();
        assert_eq!(fills, vec![early_low_tid, early_high_tid, late]);
    }
}
