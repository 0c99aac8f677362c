//! Completed trade operations for the repository.

use crate::domain::{Address, Coin, CompletedTrade, Decimal, MarginMode, TimeMs, TradeDirection};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::Repository;

impl Repository {
    /// Replace every completed trade of `address` with `trades`.
    ///
    /// Delete and insert run in one transaction, so readers see either the
    /// old set or the new one.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; the previous set is kept.
    pub async fn replace_completed_trades(
        &self,
        address: &Address,
        trades: &[CompletedTrade],
    ) -> Result<usize, sqlx::Error> {
        let created_at = chrono::Utc::now().timestamp_millis();
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM completed_trades WHERE address = ?")
            .bind(address.as_str())
            .execute(&mut *tx)
            .await?;

        for trade in trades {
            sqlx::query(
                r#"
                INSERT INTO completed_trades (
                    address, coin, margin_mode, direction, size, entry_price, close_price,
                    start_time_ms, end_time_ms, total_fee, pnl, fill_count, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(address.as_str())
            .bind(trade.coin.as_str())
            .bind(trade.margin_mode.as_str())
            .bind(trade.direction.as_str())
            .bind(trade.size.to_canonical_string())
            .bind(trade.entry_price.to_canonical_string())
            .bind(trade.close_price.to_canonical_string())
            .bind(trade.start_time_ms.as_i64())
            .bind(trade.end_time_ms.as_i64())
            .bind(trade.total_fee.to_canonical_string())
            .bind(trade.pnl.to_canonical_string())
            .bind(trade.fill_count)
            .bind(created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(trades.len())
    }

    /// Completed trades of `address`, optionally for one coin, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored row cannot be decoded.
    pub async fn query_completed_trades(
        &self,
        address: &Address,
        coin: Option<&Coin>,
    ) -> Result<Vec<CompletedTrade>, sqlx::Error> {
        let mut sql = String::from(
            r#"
            SELECT address, coin, margin_mode, direction, size, entry_price, close_price,
                   start_time_ms, end_time_ms, total_fee, pnl, fill_count
            FROM completed_trades
            WHERE address = ?
            "#,
        );
        if coin.is_some() {
            sql.push_str(" AND coin = ?");
        }
        sql.push_str(" ORDER BY start_time_ms ASC, id ASC");

        let mut query = sqlx::query(&sql).bind(address.as_str());
        if let Some(coin) = coin {
            query = query.bind(coin.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(trade_from_row).collect()
    }
}

fn trade_from_row(row: &SqliteRow) -> Result<CompletedTrade, sqlx::Error> {
    let margin_mode: String = row.try_get("margin_mode")?;
    let direction: String = row.try_get("direction")?;

    Ok(CompletedTrade {
        address: Address::new(row.try_get("address")?),
        coin: Coin::new(row.try_get("coin")?),
        margin_mode: margin_mode
            .parse::<MarginMode>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        direction: direction
            .parse::<TradeDirection>()
            .map_err(|e| sqlx::Error::Decode(e.into()))?,
        size: decimal_column(row, "size")?,
        entry_price: decimal_column(row, "entry_price")?,
        close_price: decimal_column(row, "close_price")?,
        start_time_ms: TimeMs::new(row.try_get("start_time_ms")?),
        end_time_ms: TimeMs::new(row.try_get("end_time_ms")?),
        total_fee: decimal_column(row, "total_fee")?,
        pnl: decimal_column(row, "pnl")?,
        fill_count: row.try_get("fill_count")?,
    })
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str_canonical(&raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}
