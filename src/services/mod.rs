//! Business logic services

pub mod catalog;
pub mod circulation;
pub mod events;
pub mod fines;

use std::sync::Arc;

use crate::{
    clock::Clock, error::AppResult, models::CirculationPolicy, repository::CheckoutLedger,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub circulation: circulation::CirculationService,
}

impl Services {
    /// Wire services over the given ledger and collaborators.
    /// Fails if the policy is invalid.
    pub fn new(
        ledger: Arc<dyn CheckoutLedger>,
        catalog: Arc<dyn catalog::CatalogLookup>,
        clock: Arc<dyn Clock>,
        events: Arc<dyn events::EventPublisher>,
        policy: CirculationPolicy,
    ) -> AppResult<Self> {
        policy.check()?;
        Ok(Self {
            circulation: circulation::CirculationService::new(ledger, catalog, clock, events, policy),
        })
    }
}
