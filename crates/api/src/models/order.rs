//! Order types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{Email, OrderId, OrderItemId, OrderStatus, PaymentMethod, ProductId, UserId};

/// Contact and delivery details captured at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub district: String,
}

impl CustomerInfo {
    /// Trim every field and require all of them.
    ///
    /// The email is normalized through [`Email::parse`]. Returns `None` if
    /// any field is blank or the email is malformed.
    #[must_use]
    pub fn normalized(&self) -> Option<Self> {
        let field = |v: &str| {
            let t = v.trim();
            (!t.is_empty()).then(|| t.to_string())
        };

        Some(Self {
            name: field(&self.name)?,
            email: Email::parse(&self.email).ok()?.into_inner(),
            phone: field(&self.phone)?,
            address: field(&self.address)?,
            city: field(&self.city)?,
            district: field(&self.district)?,
        })
    }
}

/// A placed order with its line snapshots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub subtotal: Decimal,
    pub shipping: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Snapshot of a product at the time it was ordered.
///
/// `product_id` becomes `None` if the product is later deleted; the name,
/// image and price stay as they were.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub name: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
}
