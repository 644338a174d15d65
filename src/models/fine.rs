//! Fine types. Fines are derived from checkout records, never stored.

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

/// Fine owed on a single checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FineRecord {
    pub checkout_id: i32,
    pub item_id: i32,
    pub days_late: i64,
    pub amount: Decimal,
}

/// All fines owed by a patron
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FineSummary {
    pub patron_id: i32,
    pub total: Decimal,
    pub fines: Vec<FineRecord>,
}
