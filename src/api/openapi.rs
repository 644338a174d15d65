//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{checkouts, health};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation API",
        version = "1.0.0",
        description = "Library circulation REST API: checkouts, renewals, returns and fines"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Checkouts
        checkouts::create_checkout,
        checkouts::get_checkout,
        checkouts::renew_checkout,
        checkouts::return_checkout,
        checkouts::get_checkout_fine,
        // Patrons
        checkouts::get_patron_checkouts,
        checkouts::get_patron_fines,
    ),
    components(
        schemas(
            checkouts::CreateCheckoutRequest,
            checkouts::CheckoutResponse,
            checkouts::ReturnResponse,
            checkouts::FineResponse,
            crate::models::CheckoutRecord,
            crate::models::CheckoutStatus,
            crate::models::CheckoutSummary,
            crate::models::FineRecord,
            crate::models::FineSummary,
            health::HealthResponse,
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "checkouts", description = "Checkout, renewal and return"),
        (name = "patrons", description = "Per-patron loans and fines")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
