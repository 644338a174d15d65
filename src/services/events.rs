//! Circulation events signalled to external integrations (notifications, billing)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CirculationEvent {
    CheckedOut {
        checkout_id: i32,
        patron_id: i32,
        item_id: i32,
        due_at: DateTime<Utc>,
    },
    Renewed {
        checkout_id: i32,
        patron_id: i32,
        due_at: DateTime<Utc>,
        renewal_count: i32,
    },
    Returned {
        checkout_id: i32,
        patron_id: i32,
        returned_at: DateTime<Utc>,
    },
    DigitalExpired {
        checkout_id: i32,
        patron_id: i32,
        item_id: i32,
    },
    FineAccrued {
        checkout_id: i32,
        patron_id: i32,
        amount: Decimal,
    },
}

impl CirculationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            CirculationEvent::CheckedOut { .. } => "checked_out",
            CirculationEvent::Renewed { .. } => "renewed",
            CirculationEvent::Returned { .. } => "returned",
            CirculationEvent::DigitalExpired { .. } => "digital_expired",
            CirculationEvent::FineAccrued { .. } => "fine_accrued",
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &CirculationEvent) -> AppResult<()>;
}

/// Writes each event as a structured log line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPublisher;

#[async_trait]
impl EventPublisher for TracingPublisher {
    async fn publish(&self, event: &CirculationEvent) -> AppResult<()> {
        let payload = serde_json::to_string(event)
            .map_err(|e| AppError::Internal(format!("Cannot encode event: {}", e)))?;
        tracing::info!(target: "circulation::events", event = event.name(), %payload, "circulation event");
        Ok(())
    }
}

/// Fans events out to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<CirculationEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CirculationEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &CirculationEvent) -> AppResult<()> {
        // No subscribers is not an error
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}
