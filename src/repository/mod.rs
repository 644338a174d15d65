//! Repository layer: the circulation ledger and catalog lookups

pub mod checkouts;
pub mod items;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{CheckoutRecord, NewCheckout},
};

/// Authoritative store of checkout records.
///
/// Every state-changing method checks and writes in one atomic step so
/// concurrent callers (and concurrent service instances) cannot both win.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckoutLedger: Send + Sync {
    async fn get(&self, id: i32) -> AppResult<Option<CheckoutRecord>>;

    /// Append a record. `Conflict` if the patron already holds an active loan of the item.
    async fn insert(&self, checkout: &NewCheckout) -> AppResult<CheckoutRecord>;

    /// Push `due_at` forward by `extension_days` and count the renewal.
    /// `NotFound` if missing or closed, `LimitExceeded` at the cap.
    async fn renew(&self, id: i32, extension_days: i32) -> AppResult<CheckoutRecord>;

    /// Close an active record. `NotFound` if missing or already closed.
    async fn close(&self, id: i32, returned_at: DateTime<Utc>) -> AppResult<CheckoutRecord>;

    /// Active records of a patron, newest checkout first
    async fn list_active_for_patron(&self, patron_id: i32) -> AppResult<Vec<CheckoutRecord>>;

    /// Every record of a patron, active and closed
    async fn list_for_patron(&self, patron_id: i32) -> AppResult<Vec<CheckoutRecord>>;

    /// Close active digital loans due before `now`, with `returned_at = due_at`
    async fn expire_digital(&self, now: DateTime<Utc>) -> AppResult<Vec<CheckoutRecord>>;

    /// Check the backing store is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// PostgreSQL-backed repositories sharing one pool
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
    pub checkouts: checkouts::PgCheckoutLedger,
    pub items: items::PgCatalogLookup,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            checkouts: checkouts::PgCheckoutLedger::new(pool.clone()),
            items: items::PgCatalogLookup::new(pool.clone()),
            pool,
        }
    }
}
