//! Circulation service: the single authority over checkout state transitions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    clock::Clock,
    error::{AppError, AppResult},
    models::{
        CheckoutRecord, CheckoutSummary, CirculationPolicy, FineRecord, FineSummary, NewCheckout,
    },
    repository::CheckoutLedger,
};

use super::{
    catalog::CatalogLookup,
    events::{CirculationEvent, EventPublisher},
    fines,
};

#[derive(Clone)]
pub struct CirculationService {
    ledger: Arc<dyn CheckoutLedger>,
    catalog: Arc<dyn CatalogLookup>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventPublisher>,
    policy: CirculationPolicy,
}

impl CirculationService {
    pub fn new(
        ledger: Arc<dyn CheckoutLedger>,
        catalog: Arc<dyn CatalogLookup>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventPublisher>,
        policy: CirculationPolicy,
    ) -> Self {
        Self {
            ledger,
            catalog,
            clock,
            events,
            policy,
        }
    }

    /// Policy bound at construction
    pub fn policy(&self) -> &CirculationPolicy {
        &self.policy
    }

    /// Lend `item_id` to `patron_id`
    pub async fn checkout(
        &self,
        patron_id: i32,
        item_id: i32,
        policy: &CirculationPolicy,
    ) -> AppResult<CheckoutRecord> {
        policy.check()?;
        let now = self.clock.now();
        let due_at = now
            .checked_add_signed(policy.loan_period())
            .ok_or_else(|| AppError::Validation("Loan period puts the due date out of range".to_string()))?;
        self.sweep(now).await?;

        if !self.catalog.item_exists(item_id).await? {
            return Err(AppError::NotFound(format!("Item with id {} not found", item_id)));
        }
        let is_digital = self.catalog.is_digital(item_id).await?;

        let record = self
            .ledger
            .insert(&NewCheckout {
                patron_id,
                item_id,
                is_digital,
                checkout_at: now,
                due_at,
                max_renewals: policy.max_renewals,
            })
            .await
            .map_err(|e| {
                if let AppError::Conflict(_) = e {
                    tracing::debug!(patron_id, item_id, "Checkout rejected: already on loan");
                }
                e
            })?;

        tracing::info!(
            checkout_id = record.id,
            patron_id,
            item_id,
            is_digital,
            due_at = %record.due_at,
            "Item checked out"
        );
        self.emit(CirculationEvent::CheckedOut {
            checkout_id: record.id,
            patron_id,
            item_id,
            due_at: record.due_at,
        })
        .await;

        Ok(record)
    }

    /// Extend an active loan from its current due date
    pub async fn renew(&self, checkout_id: i32, policy: &CirculationPolicy) -> AppResult<CheckoutRecord> {
        policy.check()?;
        let now = self.clock.now();
        self.sweep(now).await?;

        let record = self
            .ledger
            .renew(checkout_id, policy.renewal_extension_days)
            .await
            .map_err(|e| {
                if let AppError::LimitExceeded(ref msg) = e {
                    tracing::debug!(checkout_id, "Renewal rejected: {}", msg);
                }
                e
            })?;

        tracing::info!(
            checkout_id,
            renewal_count = record.renewal_count,
            due_at = %record.due_at,
            "Checkout renewed"
        );
        self.emit(CirculationEvent::Renewed {
            checkout_id,
            patron_id: record.patron_id,
            due_at: record.due_at,
            renewal_count: record.renewal_count,
        })
        .await;

        Ok(record)
    }

    /// Close an active loan
    pub async fn return_checkout(&self, checkout_id: i32) -> AppResult<CheckoutRecord> {
        let now = self.clock.now();
        self.sweep(now).await?;

        let record = self.ledger.close(checkout_id, now).await?;

        tracing::info!(checkout_id, patron_id = record.patron_id, "Checkout returned");
        self.emit(CirculationEvent::Returned {
            checkout_id,
            patron_id: record.patron_id,
            returned_at: now,
        })
        .await;

        if let Some(fine) = fines::assess(&record, now, &self.policy) {
            tracing::info!(checkout_id, days_late = fine.days_late, amount = %fine.amount, "Fine accrued");
            self.emit(CirculationEvent::FineAccrued {
                checkout_id,
                patron_id: record.patron_id,
                amount: fine.amount,
            })
            .await;
        }

        Ok(record)
    }

    /// Fine currently owed on a checkout
    pub async fn outstanding_fine(&self, checkout_id: i32, policy: &CirculationPolicy) -> AppResult<Decimal> {
        policy.check()?;
        let now = self.clock.now();
        let record = self.get_checkout(checkout_id).await?;
        Ok(fines::outstanding(&record, now, policy))
    }

    pub async fn get_checkout(&self, checkout_id: i32) -> AppResult<CheckoutRecord> {
        self.ledger
            .get(checkout_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Checkout with id {} not found", checkout_id)))
    }

    /// Active loans of a patron with title, status and current fine
    pub async fn patron_checkouts(&self, patron_id: i32) -> AppResult<Vec<CheckoutSummary>> {
        let now = self.clock.now();
        self.sweep(now).await?;

        let records = self.ledger.list_active_for_patron(patron_id).await?;
        let mut result = Vec::with_capacity(records.len());
        for record in records {
            let title = self.catalog.title(record.item_id).await?;
            result.push(CheckoutSummary {
                status: record.status(now),
                outstanding_fine: fines::outstanding(&record, now, &self.policy),
                title,
                checkout: record,
            });
        }
        Ok(result)
    }

    /// Every fine a patron owes, active and returned loans alike
    pub async fn patron_fines(&self, patron_id: i32, policy: &CirculationPolicy) -> AppResult<FineSummary> {
        policy.check()?;
        let now = self.clock.now();
        let records = self.ledger.list_for_patron(patron_id).await?;

        let fines: Vec<FineRecord> = records
            .iter()
            .filter_map(|record| fines::assess(record, now, policy))
            .collect();
        let total = fines.iter().map(|f| f.amount).sum();

        Ok(FineSummary {
            patron_id,
            total,
            fines,
        })
    }

    /// Close past-due digital loans
    pub async fn expire_digital_loans(&self) -> AppResult<Vec<CheckoutRecord>> {
        let now = self.clock.now();
        self.sweep(now).await
    }

    /// Check the ledger's backing store is reachable
    pub async fn ping(&self) -> AppResult<()> {
        self.ledger.ping().await
    }

    async fn sweep(&self, now: DateTime<Utc>) -> AppResult<Vec<CheckoutRecord>> {
        let expired = self.ledger.expire_digital(now).await?;
        for record in &expired {
            tracing::info!(checkout_id = record.id, patron_id = record.patron_id, "Digital loan expired");
            self.emit(CirculationEvent::DigitalExpired {
                checkout_id: record.id,
                patron_id: record.patron_id,
                item_id: record.item_id,
            })
            .await;
        }
        Ok(expired)
    }

    /// Events follow committed writes; a failed publish does not undo the write
    async fn emit(&self, event: CirculationEvent) {
        if let Err(e) = self.events.publish(&event).await {
            tracing::warn!(event = event.name(), "Failed to publish circulation event: {}", e);
        }
    }
}
