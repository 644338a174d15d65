//! Fine computation over checkout records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::models::{CheckoutRecord, CirculationPolicy, FineRecord};

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Whole days between `due_at` and `at`, any started day counting in full.
/// Zero when `at` is not after `due_at`.
pub fn days_late(due_at: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let late_ms = (at - due_at).num_milliseconds();
    if late_ms <= 0 {
        return 0;
    }
    (late_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
}

/// Amount owed for `days` late under `policy`, capped when a cap is set
pub fn amount_for(days: i64, policy: &CirculationPolicy) -> Decimal {
    if days <= 0 {
        return Decimal::ZERO;
    }
    // Saturates instead of overflowing; the cap still applies
    let amount = Decimal::from(days)
        .checked_mul(policy.daily_fine_rate)
        .unwrap_or(Decimal::MAX)
        .max(Decimal::ZERO);
    match policy.fine_cap {
        Some(cap) => amount.min(cap),
        None => amount,
    }
}

/// Fine on `record` as of `now`. Closed loans are judged at their return time.
pub fn outstanding(record: &CheckoutRecord, now: DateTime<Utc>, policy: &CirculationPolicy) -> Decimal {
    assess(record, now, policy)
        .map(|fine| fine.amount)
        .unwrap_or(Decimal::ZERO)
}

/// Fine record for `record`, or `None` when nothing is owed.
/// Digital loans expire instead of accruing fines.
pub fn assess(record: &CheckoutRecord, now: DateTime<Utc>, policy: &CirculationPolicy) -> Option<FineRecord> {
    if record.is_digital {
        return None;
    }
    let reference = record.returned_at.unwrap_or(now);
    let days = days_late(record.due_at, reference);
    let amount = amount_for(days, policy);
    if amount.is_zero() {
        return None;
    }
    Some(FineRecord {
        checkout_id: record.id,
        item_id: record.item_id,
        days_late: days,
        amount,
    })
}
