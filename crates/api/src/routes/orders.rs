//! Checkout and order history routes.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use shopfront_core::{OrderId, UserRole};

use crate::db::{OrderRepository, UserRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::Order;
use crate::services::checkout::{CheckoutRequest, CheckoutService};
use crate::state::AppState;

/// `POST /api/orders`
#[instrument(skip(state, user, request), fields(user_id = %user.id, method = %request.payment_method))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = CheckoutService::new(state.pool())
        .place_order(user.id, &request)
        .await?;

    add_breadcrumb(
        "checkout",
        "Order placed",
        Some(&[("order_id", &order.id.to_string())]),
    );
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /api/orders`
pub async fn index(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_for_user(user.id)
        .await?;
    Ok(Json(orders))
}

/// `GET /api/orders/{id}`
///
/// Customers see only their own orders; admins may read any. Admin status
/// is confirmed against the stored role, not the session snapshot.
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let not_found = || AppError::NotFound("Order not found".to_string());
    let order = OrderRepository::new(state.pool())
        .get(id)
        .await?
        .ok_or_else(not_found)?;

    if order.user_id != user.id {
        let still_admin = user.is_admin()
            && UserRepository::new(state.pool())
                .get_by_id(user.id)
                .await?
                .is_some_and(|stored| stored.role == UserRole::Admin);
        if !still_admin {
            return Err(not_found());
        }
    }

    Ok(Json(order))
}

/// `POST /api/orders/{id}/cancel`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    let order = CheckoutService::new(state.pool()).cancel(user.id, id).await?;
    Ok(Json(order))
}
