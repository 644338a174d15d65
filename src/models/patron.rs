//! Patron identity carried in bearer tokens

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Role of the authenticated caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patron,
    Librarian,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patron => "patron",
            Role::Librarian => "librarian",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// JWT claims issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatronClaims {
    pub sub: String,
    pub patron_id: i32,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl PatronClaims {
    pub fn new(sub: impl Into<String>, patron_id: i32, role: Role, ttl_hours: u64) -> Self {
        let now = Utc::now();
        // Capped at ten years
        let ttl = Duration::hours(ttl_hours.min(24 * 365 * 10) as i64);
        Self {
            sub: sub.into(),
            patron_id,
            role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_librarian(&self) -> bool {
        self.role == Role::Librarian
    }

    /// Patrons may only touch their own loans; librarians may touch any
    pub fn require_access_to(&self, patron_id: i32) -> Result<(), AppError> {
        if self.is_librarian() || self.patron_id == patron_id {
            Ok(())
        } else {
            Err(AppError::Authorization(
                "Insufficient rights to access another patron's loans".to_string(),
            ))
        }
    }
}
