//! Disbursement ledger
//!
//! Append-only log of reward disbursements backed by SQLite. Rows are never
//! updated or deleted; the daily quota check reads the per-wallet sum over
//! the current UTC calendar day.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::Result;

/// A single disbursement record from the mining log
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct DisbursementRecord {
    pub id: i64,
    pub wallet: String,
    pub amount: f64,
    pub tx: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only store for disbursement records
#[derive(Clone)]
pub struct LedgerStore {
    pool: SqlitePool,
}

impl LedgerStore {
    /// Open (creating if missing) the ledger database and run migrations
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| crate::error::Error::Database(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        info!("Ledger database ready at {}", url);
        Ok(store)
    }

    /// Create the mining log table if it does not exist
    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mining_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet TEXT NOT NULL,
                amount REAL NOT NULL,
                tx TEXT,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_mining_log_wallet_day ON mining_log (wallet, created_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append a disbursement record, returning its row id
    pub async fn record(&self, wallet: &str, amount: f64, tx: Option<&str>) -> Result<i64> {
        let created_at = Utc::now();
        let result = sqlx::query(
            "INSERT INTO mining_log (wallet, amount, tx, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(wallet)
        .bind(amount)
        .bind(tx)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        debug!(
            "Recorded disbursement #{}: {} -> {} (tx: {})",
            id,
            amount,
            wallet,
            tx.unwrap_or("none")
        );
        Ok(id)
    }

    /// Sum of amounts disbursed to `wallet` during the current UTC day
    pub async fn mined_today(&self, wallet: &str) -> Result<f64> {
        self.mined_on_day(wallet, Utc::now()).await
    }

    /// Sum of amounts disbursed to `wallet` on the UTC day containing `at`
    pub async fn mined_on_day(&self, wallet: &str, at: DateTime<Utc>) -> Result<f64> {
        let (day_start, day_end) = utc_day_bounds(at);

        let row = sqlx::query(
            "SELECT COALESCE(SUM(amount), 0.0) AS total FROM mining_log \
             WHERE wallet = ?1 AND created_at >= ?2 AND created_at < ?3",
        )
        .bind(wallet)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get::<f64, _>("total"))
    }

    /// Most recent disbursements for a wallet, newest first
    pub async fn recent(&self, wallet: &str, limit: i64) -> Result<Vec<DisbursementRecord>> {
        let records = sqlx::query_as::<_, DisbursementRecord>(
            "SELECT id, wallet, amount, tx, created_at FROM mining_log \
             WHERE wallet = ?1 ORDER BY id DESC LIMIT ?2",
        )
        .bind(wallet)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// Half-open [start, end) bounds of the UTC day containing `at`
fn utc_day_bounds(at: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = at
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc();
    (start, start + Duration::days(1))
}
