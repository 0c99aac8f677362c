//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by domain:
//! - `fills.rs` - Fill storage, resumption watermarks and history reloads
//! - `trades.rs` - Completed trade replacement and queries
//!
//! Tracked addresses and the proxy pool live here.

mod fills;
mod trades;

use crate::domain::{Address, ProxyEndpoint};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Tracked addresses
    // =========================================================================

    /// Register addresses for harvesting. Already-tracked addresses are left alone.
    ///
    /// Returns the number of newly tracked addresses.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn upsert_tracked_addresses(
        &self,
        addresses: &[Address],
    ) -> Result<usize, sqlx::Error> {
        if addresses.is_empty() {
            return Ok(0);
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for address in addresses {
            let result = sqlx::query(
                r#"
                INSERT INTO traders (address, created_at)
                VALUES (?, ?)
                ON CONFLICT(address) DO NOTHING
                "#,
            )
            .bind(address.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// All tracked addresses, in a stable order.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load_tracked_addresses(&self) -> Result<Vec<Address>, sqlx::Error> {
        let rows = sqlx::query("SELECT address FROM traders ORDER BY address ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("address").map(Address::new))
            .collect()
    }

    pub async fn count_tracked_addresses(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM traders")
            .fetch_one(&self.pool)
            .await
    }

    // =========================================================================
    // Proxy pool
    // =========================================================================

    /// Add a proxy to the pool. Returns its id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_proxy(
        &self,
        host: &str,
        port: &str,
        username: Option<&str>,
        password: Option<&str>,
        active: bool,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO proxy_pool (host, port, username, password, status)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(host)
        .bind(port)
        .bind(username)
        .bind(password)
        .bind(if active { 1 } else { 0 })
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Active proxies (`status = 1`), ordered by id so worker indexing is stable.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn load_active_proxies(&self) -> Result<Vec<ProxyEndpoint>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, host, port, username, password
            FROM proxy_pool
            WHERE status = 1
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(ProxyEndpoint {
                    id: row.try_get("id")?,
                    host: row.try_get("host")?,
                    port: row.try_get("port")?,
                    username: row.try_get("username")?,
                    password: row.try_get("password")?,
                })
            })
            .collect()
    }
}
