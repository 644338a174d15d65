//! Circulation policy: loan period, renewal cap and fine rates

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Upper bound on the daily fine rate
pub const MAX_DAILY_FINE_RATE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct CirculationPolicy {
    #[validate(range(min = 1, max = 3650, message = "Loan period must be between 1 and 3650 days"))]
    pub loan_period_days: i32,
    #[validate(range(
        min = 1,
        max = 3650,
        message = "Renewal extension must be between 1 and 3650 days"
    ))]
    pub renewal_extension_days: i32,
    #[validate(range(min = 0, max = 100, message = "Maximum renewals must be between 0 and 100"))]
    pub max_renewals: i32,
    pub daily_fine_rate: Decimal,
    pub fine_cap: Option<Decimal>,
}

impl Default for CirculationPolicy {
    fn default() -> Self {
        Self {
            loan_period_days: 14,
            renewal_extension_days: 14,
            max_renewals: 3,
            daily_fine_rate: Decimal::new(25, 2),
            fine_cap: None,
        }
    }
}

impl CirculationPolicy {
    pub fn loan_period(&self) -> Duration {
        Duration::days(i64::from(self.loan_period_days))
    }

    pub fn renewal_extension(&self) -> Duration {
        Duration::days(i64::from(self.renewal_extension_days))
    }

    /// Validate field ranges and money amounts
    pub fn check(&self) -> AppResult<()> {
        self.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        if self.daily_fine_rate.is_sign_negative() {
            return Err(AppError::Validation(
                "Daily fine rate cannot be negative".to_string(),
            ));
        }
        if self.daily_fine_rate > MAX_DAILY_FINE_RATE {
            return Err(AppError::Validation(format!(
                "Daily fine rate cannot exceed {}",
                MAX_DAILY_FINE_RATE
            )));
        }
        if let Some(cap) = self.fine_cap {
            if cap.is_sign_negative() {
                return Err(AppError::Validation("Fine cap cannot be negative".to_string()));
            }
        }
        Ok(())
    }
}
