//! Checkouts ledger backed by PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{CheckoutRecord, NewCheckout},
};

use super::CheckoutLedger;

#[derive(Clone)]
pub struct PgCheckoutLedger {
    pool: Pool<Postgres>,
}

impl PgCheckoutLedger {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Explain why a conditional update matched no row
    async fn rejection(&self, id: i32) -> AppError {
        match self.get(id).await {
            Ok(Some(record)) if record.is_active() => AppError::LimitExceeded(format!(
                "Maximum renewals reached ({}/{})",
                record.renewal_count, record.max_renewals
            )),
            Ok(Some(_)) => AppError::NotFound(format!("Checkout {} is already closed", id)),
            Ok(None) => AppError::NotFound(format!("Checkout with id {} not found", id)),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl CheckoutLedger for PgCheckoutLedger {
    async fn get(&self, id: i32) -> AppResult<Option<CheckoutRecord>> {
        let record = sqlx::query_as::<_, CheckoutRecord>("SELECT * FROM checkouts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn insert(&self, checkout: &NewCheckout) -> AppResult<CheckoutRecord> {
        // The partial unique index on (patron_id, item_id) WHERE returned_at IS NULL
        // decides concurrent checkouts of the same pair.
        sqlx::query_as::<_, CheckoutRecord>(
            r#"
            INSERT INTO checkouts (patron_id, item_id, is_digital, checkout_at, due_at, renewal_count, max_renewals)
            VALUES ($1, $2, $3, $4, $5, 0, $6)
            RETURNING *
            "#,
        )
        .bind(checkout.patron_id)
        .bind(checkout.item_id)
        .bind(checkout.is_digital)
        .bind(checkout.checkout_at)
        .bind(checkout.due_at)
        .bind(checkout.max_renewals)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(format!(
                "Patron {} already has item {} checked out",
                checkout.patron_id, checkout.item_id
            )),
            sqlx::Error::Database(ref db) if db.is_check_violation() => {
                AppError::Validation(format!("Checkout rejected by ledger constraints: {}", db.message()))
            }
            other => AppError::Database(other),
        })
    }

    async fn renew(&self, id: i32, extension_days: i32) -> AppResult<CheckoutRecord> {
        let renewed = sqlx::query_as::<_, CheckoutRecord>(
            r#"
            UPDATE checkouts
            SET due_at = due_at + make_interval(days => $2),
                renewal_count = renewal_count + 1
            WHERE id = $1
              AND returned_at IS NULL
              AND renewal_count < max_renewals
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(extension_days)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_check_violation() => {
                AppError::Validation(format!("Renewal rejected by ledger constraints: {}", db.message()))
            }
            other => AppError::Database(other),
        })?;

        match renewed {
            Some(record) => Ok(record),
            None => Err(self.rejection(id).await),
        }
    }

    async fn close(&self, id: i32, returned_at: DateTime<Utc>) -> AppResult<CheckoutRecord> {
        sqlx::query_as::<_, CheckoutRecord>(
            r#"
            UPDATE checkouts
            SET returned_at = $2
            WHERE id = $1 AND returned_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(returned_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No active checkout with id {}", id)))
    }

    async fn list_active_for_patron(&self, patron_id: i32) -> AppResult<Vec<CheckoutRecord>> {
        let records = sqlx::query_as::<_, CheckoutRecord>(
            r#"
            SELECT * FROM checkouts
            WHERE patron_id = $1 AND returned_at IS NULL
            ORDER BY checkout_at DESC, id DESC
            "#,
        )
        .bind(patron_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn list_for_patron(&self, patron_id: i32) -> AppResult<Vec<CheckoutRecord>> {
        let records = sqlx::query_as::<_, CheckoutRecord>(
            "SELECT * FROM checkouts WHERE patron_id = $1 ORDER BY checkout_at DESC, id DESC",
        )
        .bind(patron_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn expire_digital(&self, now: DateTime<Utc>) -> AppResult<Vec<CheckoutRecord>> {
        let records = sqlx::query_as::<_, CheckoutRecord>(
            r#"
            UPDATE checkouts
            SET returned_at = due_at
            WHERE is_digital AND returned_at IS NULL AND due_at < $1
            RETURNING *
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
