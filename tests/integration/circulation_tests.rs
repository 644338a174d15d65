//! Circulation scenarios against the in-process ledger

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use tokio::sync::Barrier;

use circulation_server::{
    clock::ManualClock,
    error::AppError,
    models::{CheckoutStatus, CirculationPolicy},
    repository::memory::{MemoryCatalog, MemoryLedger},
    services::{
        circulation::CirculationService,
        events::{BroadcastPublisher, CirculationEvent},
    },
};

const PATRON: i32 = 1;
const BOOK: i32 = 100;
const OTHER_BOOK: i32 = 101;
const EBOOK: i32 = 200;

fn jan(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
}

struct Harness {
    clock: Arc<ManualClock>,
    events: BroadcastPublisher,
    service: CirculationService,
}

fn harness_with(policy: CirculationPolicy) -> Harness {
    let clock = Arc::new(ManualClock::new(jan(1)));
    let events = BroadcastPublisher::new(64);
    let catalog = MemoryCatalog::new()
        .with_item(BOOK, "The Left Hand of Darkness", false)
        .with_item(OTHER_BOOK, "The Dispossessed", false)
        .with_item(EBOOK, "A Wizard of Earthsea", true);
    let service = CirculationService::new(
        Arc::new(MemoryLedger::new()),
        Arc::new(catalog),
        clock.clone(),
        Arc::new(events.clone()),
        policy,
    );
    Harness {
        clock,
        events,
        service,
    }
}

fn harness() -> Harness {
    harness_with(CirculationPolicy::default())
}

#[tokio::test]
async fn test_checkout_due_date_is_exactly_one_loan_period() {
    let h = harness();
    let policy = CirculationPolicy::default();

    let record = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();
    assert_eq!(record.checkout_at, jan(1));
    assert_eq!(record.due_at, jan(15));
    assert_eq!(record.due_at - record.checkout_at, policy.loan_period());
    assert_eq!(record.renewal_count, 0);
    assert_eq!(record.max_renewals, 3);
    assert!(record.returned_at.is_none());
    assert!(!record.is_digital);

    let custom = CirculationPolicy {
        loan_period_days: 21,
        ..Default::default()
    };
    let record = h.service.checkout(PATRON, OTHER_BOOK, &custom).await.unwrap();
    assert_eq!(record.due_at - record.checkout_at, Duration::days(21));
}

#[tokio::test]
async fn test_renewal_scenario_up_to_cap() {
    let h = harness();
    let policy = CirculationPolicy::default();

    let record = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();
    assert_eq!(record.due_at, jan(15));

    let renewed = h.service.renew(record.id, &policy).await.unwrap();
    assert_eq!(renewed.due_at, jan(29));
    assert_eq!(renewed.renewal_count, 1);

    h.service.renew(record.id, &policy).await.unwrap();
    let third = h.service.renew(record.id, &policy).await.unwrap();
    assert_eq!(third.renewal_count, 3);
    assert_eq!(third.due_at, Utc.with_ymd_and_hms(2024, 2, 26, 0, 0, 0).unwrap());

    let fourth = h.service.renew(record.id, &policy).await;
    assert!(matches!(fourth, Err(AppError::LimitExceeded(_))));

    let unchanged = h.service.get_checkout(record.id).await.unwrap();
    assert_eq!(unchanged, third);
}

#[tokio::test]
async fn test_renewal_extends_from_due_date_not_now() {
    let h = harness();
    let policy = CirculationPolicy::default();
    let record = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();

    // Early: due date is 10 days away
    h.clock.set(jan(5));
    let renewed = h.service.renew(record.id, &policy).await.unwrap();
    assert_eq!(renewed.due_at, record.checkout_at + Duration::days(28));

    // Late: already overdue, no catching up to now
    h.clock.set(Utc.with_ymd_and_hms(2024, 2, 10, 0, 0, 0).unwrap());
    let late = h.service.renew(record.id, &policy).await.unwrap();
    assert_eq!(late.due_at, renewed.due_at + Duration::days(14));
}

#[tokio::test]
async fn test_zero_renewal_policy_rejects_first_renewal() {
    let policy = CirculationPolicy {
        max_renewals: 0,
        ..Default::default()
    };
    let h = harness_with(policy.clone());
    let record = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();

    let err = h.service.renew(record.id, &policy).await;
    assert!(matches!(err, Err(AppError::LimitExceeded(_))));
}

#[tokio::test]
async fn test_duplicate_checkout_conflicts_until_returned() {
    let h = harness();
    let policy = CirculationPolicy::default();
    let record = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();

    let dup = h.service.checkout(PATRON, BOOK, &policy).await;
    assert!(matches!(dup, Err(AppError::Conflict(_))));

    h.service.return_checkout(record.id).await.unwrap();
    assert!(h.service.checkout(PATRON, BOOK, &policy).await.is_ok());
}

#[tokio::test]
async fn test_unknown_item_not_found() {
    let h = harness();
    let err = h.service.checkout(PATRON, 9999, &CirculationPolicy::default()).await;
    assert!(matches!(err, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_double_return_is_not_found_and_keeps_first_return() {
    let h = harness();
    let record = h
        .service
        .checkout(PATRON, BOOK, &CirculationPolicy::default())
        .await
        .unwrap();

    h.clock.set(jan(10));
    let returned = h.service.return_checkout(record.id).await.unwrap();
    assert_eq!(returned.returned_at, Some(jan(10)));

    h.clock.set(jan(12));
    let again = h.service.return_checkout(record.id).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));

    let stored = h.service.get_checkout(record.id).await.unwrap();
    assert_eq!(stored.returned_at, Some(jan(10)));

    let renew = h.service.renew(record.id, &CirculationPolicy::default()).await;
    assert!(matches!(renew, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_unknown_checkout_not_found() {
    let h = harness();
    let policy = CirculationPolicy::default();
    assert!(matches!(h.service.renew(7, &policy).await, Err(AppError::NotFound(_))));
    assert!(matches!(h.service.return_checkout(7).await, Err(AppError::NotFound(_))));
    assert!(matches!(
        h.service.outstanding_fine(7, &policy).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_fines_accrue_per_started_day_and_respect_cap() {
    let policy = CirculationPolicy {
        daily_fine_rate: Decimal::new(50, 2),
        fine_cap: Some(Decimal::new(500, 2)),
        ..Default::default()
    };
    let h = harness_with(policy.clone());
    let record = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();

    h.clock.set(jan(15));
    assert_eq!(h.service.outstanding_fine(record.id, &policy).await.unwrap(), Decimal::ZERO);

    h.clock.set(jan(15) + Duration::hours(1));
    assert_eq!(
        h.service.outstanding_fine(record.id, &policy).await.unwrap(),
        Decimal::new(50, 2)
    );

    let mut previous = Decimal::ZERO;
    for day in 1..=10 {
        h.clock.set(jan(15) + Duration::days(day));
        let fine = h.service.outstanding_fine(record.id, &policy).await.unwrap();
        assert!(fine > previous);
        previous = fine;
    }
    assert_eq!(previous, Decimal::new(500, 2));

    h.clock.set(jan(15) + Duration::days(60));
    assert_eq!(
        h.service.outstanding_fine(record.id, &policy).await.unwrap(),
        Decimal::new(500, 2)
    );
}

#[tokio::test]
async fn test_returned_late_keeps_fine_and_emits_event() {
    let h = harness();
    let mut rx = h.events.subscribe();
    let policy = CirculationPolicy::default();
    let record = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();

    h.clock.set(jan(18));
    h.service.return_checkout(record.id).await.unwrap();

    // Fine is frozen at the return date
    h.clock.set(jan(31));
    assert_eq!(
        h.service.outstanding_fine(record.id, &policy).await.unwrap(),
        Decimal::new(75, 2)
    );

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CirculationEvent::FineAccrued { amount, .. } = &event {
            assert_eq!(*amount, Decimal::new(75, 2));
        }
        names.push(event.name());
    }
    assert_eq!(names, vec!["checked_out", "returned", "fine_accrued"]);
}

#[tokio::test]
async fn test_on_time_return_has_no_fine_event() {
    let h = harness();
    let mut rx = h.events.subscribe();
    let record = h
        .service
        .checkout(PATRON, BOOK, &CirculationPolicy::default())
        .await
        .unwrap();

    h.clock.set(jan(14));
    h.service.return_checkout(record.id).await.unwrap();

    let mut names = Vec::new();
    while let Ok(event) = rx.try_recv() {
        names.push(event.name());
    }
    assert_eq!(names, vec!["checked_out", "returned"]);
}

#[tokio::test]
async fn test_digital_loans_expire_instead_of_accruing_fines() {
    let h = harness();
    let mut rx = h.events.subscribe();
    let policy = CirculationPolicy::default();

    let ebook = h.service.checkout(PATRON, EBOOK, &policy).await.unwrap();
    assert!(ebook.is_digital);

    h.clock.set(jan(20));
    assert_eq!(h.service.outstanding_fine(ebook.id, &policy).await.unwrap(), Decimal::ZERO);

    let expired = h.service.expire_digital_loans().await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].returned_at, Some(ebook.due_at));

    // Closed: no renew, no return, but it can be borrowed again
    assert!(matches!(h.service.renew(ebook.id, &policy).await, Err(AppError::NotFound(_))));
    assert!(matches!(h.service.return_checkout(ebook.id).await, Err(AppError::NotFound(_))));
    let again = h.service.checkout(PATRON, EBOOK, &policy).await.unwrap();
    assert_eq!(again.checkout_at, jan(20));

    let names: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.name()).collect();
    assert_eq!(names, vec!["checked_out", "digital_expired", "checked_out"]);
}

#[tokio::test]
async fn test_past_due_digital_loan_is_swept_before_renewal() {
    let h = harness();
    let policy = CirculationPolicy::default();
    let ebook = h.service.checkout(PATRON, EBOOK, &policy).await.unwrap();

    h.clock.set(jan(16));
    let err = h.service.renew(ebook.id, &policy).await;
    assert!(matches!(err, Err(AppError::NotFound(_))));
    assert_eq!(
        h.service.get_checkout(ebook.id).await.unwrap().returned_at,
        Some(ebook.due_at)
    );
}

#[tokio::test]
async fn test_patron_checkouts_show_derived_status() {
    let h = harness();
    let policy = CirculationPolicy::default();
    let first = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();

    h.clock.set(jan(10));
    let second = h.service.checkout(PATRON, OTHER_BOOK, &policy).await.unwrap();
    h.service.checkout(2, BOOK, &policy).await.unwrap();

    h.clock.set(jan(16));
    let summaries = h.service.patron_checkouts(PATRON).await.unwrap();
    assert_eq!(summaries.len(), 2);

    assert_eq!(summaries[0].checkout.id, second.id);
    assert_eq!(summaries[0].status, CheckoutStatus::Active);
    assert_eq!(summaries[0].title.as_deref(), Some("The Dispossessed"));

    assert_eq!(summaries[1].checkout.id, first.id);
    assert_eq!(summaries[1].status, CheckoutStatus::Overdue);
    assert_eq!(summaries[1].outstanding_fine, Decimal::new(25, 2));
}

#[tokio::test]
async fn test_patron_fines_cover_active_and_returned_loans() {
    let h = harness();
    let policy = CirculationPolicy::default();
    let first = h.service.checkout(PATRON, BOOK, &policy).await.unwrap();
    h.service.checkout(PATRON, OTHER_BOOK, &policy).await.unwrap();
    h.service.checkout(PATRON, EBOOK, &policy).await.unwrap();

    h.clock.set(jan(17));
    h.service.return_checkout(first.id).await.unwrap();

    h.clock.set(jan(19));
    let summary = h.service.patron_fines(PATRON, &policy).await.unwrap();
    assert_eq!(summary.patron_id, PATRON);
    assert_eq!(summary.fines.len(), 2);
    // 2 days on the returned book, 4 days on the one still out
    assert_eq!(summary.total, Decimal::new(150, 2));

    let none = h.service.patron_fines(2, &policy).await.unwrap();
    assert!(none.fines.is_empty());
    assert_eq!(none.total, Decimal::ZERO);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_exactly_one_wins() {
    const ATTEMPTS: usize = 32;

    let h = harness();
    let service = Arc::new(h.service);
    let barrier = Arc::new(Barrier::new(ATTEMPTS));

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                service
                    .checkout(PATRON, BOOK, &CirculationPolicy::default())
                    .await
            })
        })
        .collect();

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(conflicts, ATTEMPTS - 1);
    assert_eq!(service.patron_checkouts(PATRON).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_renewals_never_exceed_cap() {
    const ATTEMPTS: usize = 16;

    let h = harness();
    let service = Arc::new(h.service);
    let record = service
        .checkout(PATRON, BOOK, &CirculationPolicy::default())
        .await
        .unwrap();
    let barrier = Arc::new(Barrier::new(ATTEMPTS));

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|_| {
            let service = service.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                service.renew(record.id, &CirculationPolicy::default()).await
            })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::LimitExceeded(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }
    assert_eq!(successes, 3);

    let stored = service.get_checkout(record.id).await.unwrap();
    assert_eq!(stored.renewal_count, 3);
    assert_eq!(stored.due_at, record.due_at + Duration::days(42));
}

#[tokio::test]
async fn test_out_of_range_policy_is_rejected_without_side_effects() {
    let h = harness();
    let mut rx = h.events.subscribe();

    let huge_period = CirculationPolicy {
        loan_period_days: i32::MAX,
        ..Default::default()
    };
    let err = h.service.checkout(PATRON, BOOK, &huge_period).await;
    assert!(matches!(err, Err(AppError::Validation(_))));

    let negative_cap = CirculationPolicy {
        max_renewals: -1,
        ..Default::default()
    };
    let err = h.service.checkout(PATRON, BOOK, &negative_cap).await;
    assert!(matches!(err, Err(AppError::Validation(_))));
    assert!(h.service.patron_checkouts(PATRON).await.unwrap().is_empty());

    let record = h.service.checkout(PATRON, BOOK, &CirculationPolicy::default()).await.unwrap();
    let backwards = CirculationPolicy {
        renewal_extension_days: -30,
        ..Default::default()
    };
    let err = h.service.renew(record.id, &backwards).await;
    assert!(matches!(err, Err(AppError::Validation(_))));

    let unchanged = h.service.get_checkout(record.id).await.unwrap();
    assert_eq!(unchanged, record);
    assert!(unchanged.due_at > unchanged.checkout_at);

    // Only the valid checkout was published
    assert!(matches!(rx.try_recv(), Ok(CirculationEvent::CheckedOut { .. })));
    assert!(rx.try_recv().is_err());
}
