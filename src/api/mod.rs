//! API handlers for the circulation REST endpoints

pub mod checkouts;
pub mod health;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::PatronClaims, AppState};

/// Extractor for the authenticated patron from a JWT bearer token
pub struct AuthenticatedUser(pub PatronClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = PatronClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Checkouts
        .route("/checkouts", post(checkouts::create_checkout))
        .route("/checkouts/:id", get(checkouts::get_checkout))
        .route("/checkouts/:id/renew", post(checkouts::renew_checkout))
        .route("/checkouts/:id/return", post(checkouts::return_checkout))
        .route("/checkouts/:id/fine", get(checkouts::get_checkout_fine))
        // Patrons
        .route("/patrons/:id/checkouts", get(checkouts::get_patron_checkouts))
        .route("/patrons/:id/fines", get(checkouts::get_patron_fines))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
