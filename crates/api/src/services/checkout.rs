//! Checkout: validate the customer block and place the order.

use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use shopfront_core::{OrderId, OrderStatus, PaymentMethod, UserId};

use crate::db::orders::{PlaceOrderOutcome, StatusChange};
use crate::db::{OrderRepository, PlaceOrder, RepositoryError};
use crate::models::order::{CustomerInfo, Order};

/// Checkout failures that the customer can act on.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A customer field is missing or blank, or the email is malformed.
    #[error("Please fill in all required fields")]
    MissingFields,

    #[error("Your cart is empty")]
    EmptyCart,

    /// Not enough stock for the named product.
    #[error("Insufficient stock for {0}")]
    InsufficientStock(String),

    /// The named product was taken off sale after it was added.
    #[error("{0} is no longer available")]
    Unavailable(String),

    #[error("Order not found")]
    OrderNotFound,

    /// The order is past the point where the customer can cancel it.
    #[error("Order can no longer be cancelled (status: {0})")]
    NotCancellable(OrderStatus),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
}

/// Checkout service.
pub struct CheckoutService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }

    /// Place an order from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns a `CheckoutError` describing what the customer must fix, or
    /// `CheckoutError::Repository` if the database fails.
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: &CheckoutRequest,
    ) -> Result<Order, CheckoutError> {
        let customer = request
            .customer
            .normalized()
            .ok_or(CheckoutError::MissingFields)?;

        let outcome = self
            .orders
            .place(&PlaceOrder {
                user_id,
                customer,
                payment_method: request.payment_method,
            })
            .await?;

        match outcome {
            PlaceOrderOutcome::Placed(order) => {
                info!(order_id = %order.id, total = %order.total, "Order placed");
                Ok(order)
            }
            PlaceOrderOutcome::EmptyCart => Err(CheckoutError::EmptyCart),
            PlaceOrderOutcome::InsufficientStock(name) => {
                Err(CheckoutError::InsufficientStock(name))
            }
            PlaceOrderOutcome::Unavailable(name) => Err(CheckoutError::Unavailable(name)),
        }
    }

    /// Cancel one of the user's own orders and return its stock.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::OrderNotFound` if the user has no such order and
    /// `CheckoutError::NotCancellable` once it is being worked on.
    pub async fn cancel(&self, user_id: UserId, order_id: OrderId) -> Result<Order, CheckoutError> {
        let change = self
            .orders
            .transition(order_id, Some(user_id), OrderStatus::Cancelled, |current, _| {
                current.customer_cancellable()
            })
            .await?;

        match change {
            StatusChange::Updated(order) => Ok(order),
            StatusChange::NotFound => Err(CheckoutError::OrderNotFound),
            StatusChange::Rejected(current) => Err(CheckoutError::NotCancellable(current)),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: CheckoutRequest = serde_json::from_str(
            r#"{
                "customer": {
                    "name": "An Nguyen",
                    "email": "an@example.com",
                    "phone": "0901234567",
                    "address": "1 Le Loi",
                    "city": "HCMC",
                    "district": "1"
                },
                "paymentMethod": "cod"
            }"#,
        )
        .unwrap();
        assert_eq!(request.payment_method, PaymentMethod::Cod);
        assert!(request.customer.normalized().is_some());
    }

    #[test]
    fn test_missing_customer_block_is_blank() {
        let request: CheckoutRequest =
            serde_json::from_str(r#"{"paymentMethod":"bank"}"#).unwrap();
        assert!(request.customer.normalized().is_none());
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            CheckoutError::MissingFields.to_string(),
            "Please fill in all required fields"
        );
        assert_eq!(CheckoutError::EmptyCart.to_string(), "Your cart is empty");
        assert_eq!(
            CheckoutError::InsufficientStock("Linen Shirt".to_string()).to_string(),
            "Insufficient stock for Linen Shirt"
        );
    }
}
