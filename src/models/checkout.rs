//! Checkout (loan) model and related types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// One active or historical loan of one copy to one patron
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct CheckoutRecord {
    pub id: i32,
    pub patron_id: i32,
    pub item_id: i32,
    pub is_digital: bool,
    pub checkout_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub renewal_count: i32,
    pub max_renewals: i32,
    /// `None` while the loan is active
    pub returned_at: Option<DateTime<Utc>>,
}

impl CheckoutRecord {
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn can_renew(&self) -> bool {
        self.is_active() && self.renewal_count < self.max_renewals
    }

    /// Status as seen at `now`; never stored
    pub fn status(&self, now: DateTime<Utc>) -> CheckoutStatus {
        match self.returned_at {
            Some(_) => CheckoutStatus::Closed,
            None if now > self.due_at => CheckoutStatus::Overdue,
            None => CheckoutStatus::Active,
        }
    }
}

/// Derived loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    Active,
    Overdue,
    Closed,
}

/// Values for a record about to be appended to the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckout {
    pub patron_id: i32,
    pub item_id: i32,
    pub is_digital: bool,
    pub checkout_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub max_renewals: i32,
}

/// Active checkout enriched for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckoutSummary {
    pub checkout: CheckoutRecord,
    pub title: Option<String>,
    pub status: CheckoutStatus,
    pub outstanding_fine: Decimal,
}
