//! Admin routes: order board, sales report and dashboard.
//!
//! Every handler takes [`RequireAdmin`].

use std::collections::BTreeMap;

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument};

use shopfront_core::{OrderId, OrderStatus};

use crate::db::orders::StatusChange;
use crate::db::{OrderRepository, ProductRepository, ReportRepository};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAdmin;
use crate::models::{Order, Product};
use crate::services::reports::SalesReport;
use crate::state::AppState;

/// Products at or below this stock level show up on the dashboard.
const LOW_STOCK_THRESHOLD: i32 = 5;
/// Number of recent orders on the dashboard.
const RECENT_ORDERS: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

/// `GET /api/admin/dashboard` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_products: i64,
    pub low_stock: Vec<Product>,
    /// Every status, zero when there are no orders in it.
    pub orders_by_status: BTreeMap<&'static str, i64>,
    pub recent_orders: Vec<Order>,
}

fn status_counts(counts: &[(OrderStatus, i64)]) -> BTreeMap<&'static str, i64> {
    OrderStatus::ALL
        .into_iter()
        .map(|status| {
            let count = counts
                .iter()
                .find(|(s, _)| *s == status)
                .map_or(0, |(_, c)| *c);
            (status.as_str(), count)
        })
        .collect()
}

/// `GET /api/admin/orders?status=`
pub async fn orders(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ApiQuery(query): ApiQuery<OrdersQuery>,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_all(query.status)
        .await?;
    Ok(Json(orders))
}

/// `PUT /api/admin/orders/{id}/status`
#[instrument(skip(state, admin, body), fields(admin_id = %admin.id, to = %body.status))]
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusUpdate>,
) -> Result<Json<Order>> {
    let change = OrderRepository::new(state.pool())
        .transition(id, None, body.status, OrderStatus::can_transition_to)
        .await?;

    match change {
        StatusChange::Updated(order) => Ok(Json(order)),
        StatusChange::NotFound => Err(AppError::NotFound("Order not found".to_string())),
        StatusChange::Rejected(current) => Err(transition_refused(current, body.status)),
    }
}

fn transition_refused(from: OrderStatus, to: OrderStatus) -> AppError {
    AppError::Conflict(format!(
        "Cannot change order status from {} to {}",
        from.label(),
        to.label()
    ))
}

/// `DELETE /api/admin/orders/{id}`
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_order(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Value>> {
    if !OrderRepository::new(state.pool()).delete(id).await? {
        return Err(AppError::NotFound("Order not found".to_string()));
    }

    info!(order_id = %id, "Order deleted");
    Ok(Json(json!({ "message": "Order removed" })))
}

/// `GET /api/admin/reports/sales`
#[instrument(skip_all)]
pub async fn sales_report(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<SalesReport>> {
    let orders = ReportRepository::new(state.pool()).delivered_orders().await?;
    Ok(Json(SalesReport::from_orders(&orders)))
}

/// `GET /api/admin/dashboard`
#[instrument(skip_all)]
pub async fn dashboard(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Dashboard>> {
    let products = ProductRepository::new(state.pool());
    let orders = OrderRepository::new(state.pool());

    let (total_products, low_stock, counts, recent_orders) = tokio::try_join!(
        products.count(),
        products.low_stock(LOW_STOCK_THRESHOLD),
        orders.count_by_status(),
        orders.recent(RECENT_ORDERS),
    )?;

    Ok(Json(Dashboard {
        total_products,
        low_stock,
        orders_by_status: status_counts(&counts),
        recent_orders,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refused_transition_names_both_statuses() {
        let AppError::Conflict(message) =
            transition_refused(OrderStatus::Delivered, OrderStatus::Cancelled)
        else {
            panic!("expected a conflict");
        };
        assert_eq!(message, "Cannot change order status from Delivered to Cancelled");
    }

    #[test]
    fn test_status_counts_fill_missing_statuses() {
        let counts = status_counts(&[
            (OrderStatus::Pending, 3),
            (OrderStatus::Delivered, 7),
        ]);
        assert_eq!(counts.len(), OrderStatus::ALL.len());
        assert_eq!(counts["pending"], 3);
        assert_eq!(counts["delivered"], 7);
        assert_eq!(counts["cancelled"], 0);
    }
}
