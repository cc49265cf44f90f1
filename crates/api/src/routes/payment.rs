//! Payment gateway routes.
//!
//! PayPal calls go through [`PayPalClient`](crate::services::payments::PayPalClient);
//! VNPay needs no outbound call, only URL signing and return verification.

use axum::{
    Json,
    extract::State,
    http::{Extensions, HeaderMap},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use shopfront_core::{OrderId, OrderStatus, UserId, round_money};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiQuery};
use crate::middleware::{RequireAuth, client_ip};
use crate::models::Order;
use crate::services::payments::paypal::{CreatedPayment, NewPayment};
use crate::services::payments::vnpay::{self, PaymentRequest, ReturnVerification};
use crate::state::AppState;

const DEFAULT_CURRENCY: &str = "USD";

// =============================================================================
// Request Types
// =============================================================================

/// Body of `POST /api/payment/paypal`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayPalCreateRequest {
    pub amount: Decimal,
    pub currency: Option<String>,
    pub order_id: Option<OrderId>,
}

/// Body of `POST /api/payment/paypal/execute`.
#[derive(Debug, Deserialize)]
pub struct PayPalExecuteRequest {
    #[serde(rename = "paymentID")]
    pub payment_id: String,
    #[serde(rename = "payerID")]
    pub payer_id: String,
    #[serde(rename = "orderId")]
    pub order_id: Option<OrderId>,
}

/// Body of `POST /api/payment/vnpay`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnpayCreateRequest {
    pub amount: Decimal,
    pub order_id: OrderId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VnpayCreateResponse {
    pub payment_url: String,
}

/// Load one of the caller's orders.
async fn own_order(state: &AppState, user_id: UserId, order_id: OrderId) -> Result<Order> {
    OrderRepository::new(state.pool())
        .get(order_id)
        .await?
        .filter(|order| order.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// A payment may only be started for an unpaid order and for its exact total.
fn check_payable(order: &Order, amount: Decimal) -> Result<()> {
    if order.status != OrderStatus::AwaitingPayment {
        return Err(AppError::Conflict("Order is not awaiting payment".to_string()));
    }
    if round_money(amount) != round_money(order.total) {
        return Err(AppError::BadRequest(
            "Amount does not match the order total".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// PayPal
// =============================================================================

/// `POST /api/payment/paypal`
#[instrument(skip(state, user, body), fields(user_id = %user.id, amount = %body.amount))]
pub async fn paypal_create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PayPalCreateRequest>,
) -> Result<Json<CreatedPayment>> {
    let client = state.paypal()?;

    if let Some(order_id) = body.order_id {
        let order = own_order(&state, user.id, order_id).await?;
        check_payable(&order, body.amount)?;
    }

    let return_url = state.config().frontend_link("/payment/success");
    let cancel_url = state.config().frontend_link("/payment/cancel");
    let payment = client
        .create_payment(&NewPayment {
            amount: body.amount,
            currency: body.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
            invoice_number: body.order_id.map(|id| id.to_string()),
            return_url: &return_url,
            cancel_url: &cancel_url,
        })
        .await?;

    Ok(Json(payment))
}

/// `POST /api/payment/paypal/execute`
///
/// An approved payment for one of the caller's `awaiting_payment` orders
/// moves that order to `processing`, provided PayPal charged that order's
/// total under that order's invoice number.
#[instrument(skip(state, user, body), fields(user_id = %user.id, payment_id = %body.payment_id))]
pub async fn paypal_execute(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<PayPalExecuteRequest>,
) -> Result<Json<Value>> {
    let client = state.paypal()?;
    let executed = client
        .execute_payment(&body.payment_id, &body.payer_id)
        .await?;

    if let Some(order_id) = body.order_id {
        if executed.is_approved() {
            let order = own_order(&state, user.id, order_id).await?;
            if !executed.settles(&order_id.to_string(), order.total) {
                warn!(order_id = %order_id, "Approved PayPal payment does not match the order");
                return Err(AppError::Conflict(
                    "Payment does not match the order".to_string(),
                ));
            }
            let moved = OrderRepository::new(state.pool())
                .mark_paid(order_id, Some(user.id))
                .await?;
            if !moved {
                warn!(order_id = %order_id, "Approved PayPal payment for an order not awaiting payment");
            }
        } else {
            warn!(order_id = %order_id, state = ?executed.state, "PayPal payment not approved");
        }
    }

    Ok(Json(json!({ "success": true, "payment": executed.raw })))
}

// =============================================================================
// VNPay
// =============================================================================

/// `POST /api/payment/vnpay`
#[instrument(skip(state, user, headers, extensions, body), fields(user_id = %user.id, order_id = %body.order_id))]
pub async fn vnpay_create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    extensions: Extensions,
    ApiJson(body): ApiJson<VnpayCreateRequest>,
) -> Result<Json<VnpayCreateResponse>> {
    let config = state.vnpay()?;
    let order = own_order(&state, user.id, body.order_id).await?;
    check_payable(&order, body.amount)?;

    let ip_addr = client_ip(&headers, &extensions)
        .map_or_else(|| "127.0.0.1".to_string(), |ip| ip.to_string());
    let return_url = state.config().frontend_link("/payment/vnpay-return");

    let payment_url = vnpay::build_payment_url(
        config,
        &PaymentRequest {
            order_id: body.order_id,
            amount: order.total,
            ip_addr: &ip_addr,
            return_url: &return_url,
            created_at: Utc::now(),
        },
    )?;

    Ok(Json(VnpayCreateResponse { payment_url }))
}

/// `GET /api/payment/vnpay/return`
///
/// The signature is the authority here, so the order is marked paid
/// regardless of which user follows the redirect. The signed amount must
/// equal the stored order total.
#[instrument(skip_all)]
pub async fn vnpay_return(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    ApiQuery(params): ApiQuery<Vec<(String, String)>>,
) -> Result<Json<ReturnVerification>> {
    let config = state.vnpay()?;
    let verification = vnpay::verify_return(&params, &config.hash_secret);

    if !verification.valid {
        warn!("VNPay return with invalid signature");
    } else if let (true, Some(order_id)) = (verification.success, verification.order_id) {
        let orders = OrderRepository::new(state.pool());
        let order = orders
            .get(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        if !verification.pays_for(order.total) {
            warn!(
                order_id = %order_id,
                amount = ?verification.amount,
                total = %order.total,
                "VNPay amount does not match the order total"
            );
            return Err(AppError::Conflict(
                "Payment amount does not match the order total".to_string(),
            ));
        }
        let moved = orders.mark_paid(order_id, None).await?;
        info!(order_id = %order_id, moved, "VNPay payment confirmed");
    }

    Ok(Json(verification))
}
