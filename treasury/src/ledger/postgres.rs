//! Postgres ledger store
//!
//! Production adapter over two tables:
//!
//! ```sql
//! CREATE TABLE expected_payouts (
//!     reference   TEXT PRIMARY KEY,
//!     platform    TEXT NOT NULL,
//!     base_amount NUMERIC NOT NULL,
//!     received    BOOLEAN NOT NULL DEFAULT FALSE,
//!     received_at TIMESTAMPTZ,
//!     created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//!
//! CREATE TABLE engine_properties (
//!     key        TEXT PRIMARY KEY,
//!     value      TEXT NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
//! );
//! ```

use super::{LedgerStore, PayoutRecord};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Ledger store backed by Postgres.
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Connect with a small dedicated pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        info!("Connected ledger store");
        Ok(Self { pool })
    }

    /// Wrap an existing pool
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn read_payout_records(&self) -> Result<Vec<PayoutRecord>> {
        let rows = sqlx::query_as::<_, (String, String, Decimal, bool)>(
            r#"
            SELECT reference, platform, base_amount, received
            FROM expected_payouts
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(reference, platform, base_amount, received)| PayoutRecord {
                reference,
                platform,
                base_amount,
                received,
            })
            .collect())
    }

    async fn mark_received(&self, reference: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE expected_payouts
            SET received = TRUE,
                received_at = $1
            WHERE reference = $2
            "#,
        )
        .bind(Utc::now())
        .bind(reference)
        .execute(&self.pool)
        .await?;

        info!("Marked payout record {} received", reference);
        Ok(())
    }

    async fn get_property(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            r#"
            SELECT value
            FROM engine_properties
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set_property(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO engine_properties (key, value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
