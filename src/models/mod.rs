//! Data models for the circulation core

pub mod checkout;
pub mod fine;
pub mod patron;
pub mod policy;

// Re-export commonly used types
pub use checkout::{CheckoutRecord, CheckoutStatus, CheckoutSummary, NewCheckout};
pub use fine::{FineRecord, FineSummary};
pub use patron::{PatronClaims, Role};
pub use policy::CirculationPolicy;
