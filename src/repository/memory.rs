//! In-process ledger and catalog, for tests and embedding without PostgreSQL.
//!
//! The ledger applies the same rules as the PostgreSQL schema: one active loan
//! per (patron, item) and conditional renew/close, each under a single lock.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::{
    error::{AppError, AppResult},
    models::{CheckoutRecord, NewCheckout},
    services::catalog::CatalogLookup,
};

use super::CheckoutLedger;

#[derive(Debug, Default)]
struct LedgerState {
    next_id: i32,
    records: BTreeMap<i32, CheckoutRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut records: Vec<CheckoutRecord>) -> Vec<CheckoutRecord> {
    records.sort_by(|a, b| b.checkout_at.cmp(&a.checkout_at).then(b.id.cmp(&a.id)));
    records
}

#[async_trait]
impl CheckoutLedger for MemoryLedger {
    async fn get(&self, id: i32) -> AppResult<Option<CheckoutRecord>> {
        let state = self.state.lock().await;
        Ok(state.records.get(&id).cloned())
    }

    async fn insert(&self, checkout: &NewCheckout) -> AppResult<CheckoutRecord> {
        let mut state = self.state.lock().await;

        let duplicate = state.records.values().any(|r| {
            r.is_active() && r.patron_id == checkout.patron_id && r.item_id == checkout.item_id
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "Patron {} already has item {} checked out",
                checkout.patron_id, checkout.item_id
            )));
        }
        if checkout.due_at <= checkout.checkout_at {
            return Err(AppError::Validation("Due date must be after checkout date".to_string()));
        }
        if checkout.max_renewals < 0 {
            return Err(AppError::Validation("Maximum renewals cannot be negative".to_string()));
        }

        state.next_id += 1;
        let record = CheckoutRecord {
            id: state.next_id,
            patron_id: checkout.patron_id,
            item_id: checkout.item_id,
            is_digital: checkout.is_digital,
            checkout_at: checkout.checkout_at,
            due_at: checkout.due_at,
            renewal_count: 0,
            max_renewals: checkout.max_renewals,
            returned_at: None,
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn renew(&self, id: i32, extension_days: i32) -> AppResult<CheckoutRecord> {
        let mut state = self.state.lock().await;

        let record = state
            .records
            .get_mut(&id)
            .filter(|r| r.is_active())
            .ok_or_else(|| AppError::NotFound(format!("No active checkout with id {}", id)))?;

        if record.renewal_count >= record.max_renewals {
            return Err(AppError::LimitExceeded(format!(
                "Maximum renewals reached ({}/{})",
                record.renewal_count, record.max_renewals
            )));
        }

        let due_at = record
            .due_at
            .checked_add_signed(Duration::days(i64::from(extension_days)))
            .filter(|due_at| *due_at > record.checkout_at)
            .ok_or_else(|| AppError::Validation("Renewal would move the due date out of range".to_string()))?;

        record.due_at = due_at;
        record.renewal_count += 1;
        Ok(record.clone())
    }

    async fn close(&self, id: i32, returned_at: DateTime<Utc>) -> AppResult<CheckoutRecord> {
        let mut state = self.state.lock().await;

        let record = state
            .records
            .get_mut(&id)
            .filter(|r| r.is_active())
            .ok_or_else(|| AppError::NotFound(format!("No active checkout with id {}", id)))?;

        record.returned_at = Some(returned_at);
        Ok(record.clone())
    }

    async fn list_active_for_patron(&self, patron_id: i32) -> AppResult<Vec<CheckoutRecord>> {
        let state = self.state.lock().await;
        let records = state
            .records
            .values()
            .filter(|r| r.patron_id == patron_id && r.is_active())
            .cloned()
            .collect();
        Ok(newest_first(records))
    }

    async fn list_for_patron(&self, patron_id: i32) -> AppResult<Vec<CheckoutRecord>> {
        let state = self.state.lock().await;
        let records = state
            .records
            .values()
            .filter(|r| r.patron_id == patron_id)
            .cloned()
            .collect();
        Ok(newest_first(records))
    }

    async fn expire_digital(&self, now: DateTime<Utc>) -> AppResult<Vec<CheckoutRecord>> {
        let mut state = self.state.lock().await;
        let mut expired = Vec::new();
        for record in state.records.values_mut() {
            if record.is_digital && record.is_active() && record.due_at < now {
                record.returned_at = Some(record.due_at);
                expired.push(record.clone());
            }
        }
        Ok(expired)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct CatalogEntry {
    title: String,
    is_digital: bool,
}

/// Fixed catalog built up front
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    items: HashMap<i32, CatalogEntry>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item_id: i32, title: impl Into<String>, is_digital: bool) -> Self {
        self.items.insert(
            item_id,
            CatalogEntry {
                title: title.into(),
                is_digital,
            },
        );
        self
    }
}

#[async_trait]
impl CatalogLookup for MemoryCatalog {
    async fn item_exists(&self, item_id: i32) -> AppResult<bool> {
        Ok(self.items.contains_key(&item_id))
    }

    async fn is_digital(&self, item_id: i32) -> AppResult<bool> {
        Ok(self.items.get(&item_id).map(|e| e.is_digital).unwrap_or(false))
    }

    async fn title(&self, item_id: i32) -> AppResult<Option<String>> {
        Ok(self.items.get(&item_id).map(|e| e.title.clone()))
    }
}
