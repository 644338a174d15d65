//! Checkout, renewal, return and fine endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{CheckoutRecord, CheckoutSummary, FineSummary},
};

use super::AuthenticatedUser;

/// Create checkout request
#[derive(Deserialize, ToSchema)]
pub struct CreateCheckoutRequest {
    /// Catalog item ID
    pub item_id: i32,
    /// Borrowing patron; defaults to the caller. Librarians only for other patrons.
    pub patron_id: Option<i32>,
}

/// Checkout with status message
#[derive(Serialize, ToSchema)]
pub struct CheckoutResponse {
    pub checkout: CheckoutRecord,
    /// Status message
    pub message: String,
}

/// Return response with any fine owed
#[derive(Serialize, ToSchema)]
pub struct ReturnResponse {
    /// Return status
    pub status: String,
    pub checkout: CheckoutRecord,
    /// Fine owed for this loan, judged at return time
    pub fine: Decimal,
}

#[derive(Serialize, ToSchema)]
pub struct FineResponse {
    pub checkout_id: i32,
    pub amount: Decimal,
}

/// Check out an item
#[utoipa::path(
    post,
    path = "/checkouts",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    request_body = CreateCheckoutRequest,
    responses(
        (status = 201, description = "Item checked out", body = CheckoutResponse),
        (status = 403, description = "Checkout for another patron"),
        (status = 404, description = "Item not found"),
        (status = 409, description = "Patron already has this item checked out")
    )
)]
pub async fn create_checkout(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> AppResult<(StatusCode, Json<CheckoutResponse>)> {
    let patron_id = request.patron_id.unwrap_or(claims.patron_id);
    claims.require_access_to(patron_id)?;

    let circulation = &state.services.circulation;
    let checkout = circulation
        .checkout(patron_id, request.item_id, circulation.policy())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            checkout,
            message: "Item checked out successfully".to_string(),
        }),
    ))
}

/// Get a checkout record
#[utoipa::path(
    get,
    path = "/checkouts/{id}",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Checkout ID")
    ),
    responses(
        (status = 200, description = "Checkout record", body = CheckoutRecord),
        (status = 404, description = "Checkout not found")
    )
)]
pub async fn get_checkout(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(checkout_id): Path<i32>,
) -> AppResult<Json<CheckoutRecord>> {
    let checkout = state.services.circulation.get_checkout(checkout_id).await?;
    claims.require_access_to(checkout.patron_id)?;
    Ok(Json(checkout))
}

/// Renew a checkout
#[utoipa::path(
    post,
    path = "/checkouts/{id}/renew",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Checkout ID")
    ),
    responses(
        (status = 200, description = "Checkout renewed", body = CheckoutResponse),
        (status = 404, description = "Checkout not found or already returned"),
        (status = 409, description = "Max renewals reached")
    )
)]
pub async fn renew_checkout(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(checkout_id): Path<i32>,
) -> AppResult<Json<CheckoutResponse>> {
    let circulation = &state.services.circulation;
    let existing = circulation.get_checkout(checkout_id).await?;
    claims.require_access_to(existing.patron_id)?;

    let checkout = circulation.renew(checkout_id, circulation.policy()).await?;

    Ok(Json(CheckoutResponse {
        message: format!(
            "Checkout renewed ({}/{} renewals)",
            checkout.renewal_count, checkout.max_renewals
        ),
        checkout,
    }))
}

/// Return a checked out item
#[utoipa::path(
    post,
    path = "/checkouts/{id}/return",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Checkout ID")
    ),
    responses(
        (status = 200, description = "Item returned", body = ReturnResponse),
        (status = 404, description = "Checkout not found or already returned")
    )
)]
pub async fn return_checkout(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(checkout_id): Path<i32>,
) -> AppResult<Json<ReturnResponse>> {
    let circulation = &state.services.circulation;
    let existing = circulation.get_checkout(checkout_id).await?;
    claims.require_access_to(existing.patron_id)?;

    let checkout = circulation.return_checkout(checkout_id).await?;
    let fine = circulation
        .outstanding_fine(checkout_id, circulation.policy())
        .await?;

    Ok(Json(ReturnResponse {
        status: "returned".to_string(),
        checkout,
        fine,
    }))
}

/// Get the fine owed on a checkout
#[utoipa::path(
    get,
    path = "/checkouts/{id}/fine",
    tag = "checkouts",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Checkout ID")
    ),
    responses(
        (status = 200, description = "Outstanding fine", body = FineResponse),
        (status = 404, description = "Checkout not found")
    )
)]
pub async fn get_checkout_fine(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(checkout_id): Path<i32>,
) -> AppResult<Json<FineResponse>> {
    let circulation = &state.services.circulation;
    let existing = circulation.get_checkout(checkout_id).await?;
    claims.require_access_to(existing.patron_id)?;

    let amount = circulation
        .outstanding_fine(checkout_id, circulation.policy())
        .await?;

    Ok(Json(FineResponse { checkout_id, amount }))
}

/// Get a patron's active checkouts
#[utoipa::path(
    get,
    path = "/patrons/{id}/checkouts",
    tag = "patrons",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Patron ID")
    ),
    responses(
        (status = 200, description = "Patron's active checkouts", body = Vec<CheckoutSummary>),
        (status = 403, description = "Another patron's checkouts")
    )
)]
pub async fn get_patron_checkouts(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(patron_id): Path<i32>,
) -> AppResult<Json<Vec<CheckoutSummary>>> {
    claims.require_access_to(patron_id)?;

    let checkouts = state.services.circulation.patron_checkouts(patron_id).await?;
    Ok(Json(checkouts))
}

/// Get a patron's outstanding fines
#[utoipa::path(
    get,
    path = "/patrons/{id}/fines",
    tag = "patrons",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Patron ID")
    ),
    responses(
        (status = 200, description = "Patron's fines", body = FineSummary),
        (status = 403, description = "Another patron's fines")
    )
)]
pub async fn get_patron_fines(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(patron_id): Path<i32>,
) -> AppResult<Json<FineSummary>> {
    claims.require_access_to(patron_id)?;

    let circulation = &state.services.circulation;
    let fines = circulation.patron_fines(patron_id, circulation.policy()).await?;
    Ok(Json(fines))
}
