//! Shopping cart types.

use rust_decimal::Decimal;
use serde::Serialize;

use shopfront_core::{CartId, CartItemId, ProductId, UserId};

/// Most units of one product a cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 999;

/// A user's cart with its lines populated.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<CartId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    pub items: Vec<CartLine>,
    pub total_amount: Decimal,
}

impl Cart {
    /// The shape returned for a user who has no cart yet.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            id: None,
            user_id: None,
            items: Vec::new(),
            total_amount: Decimal::ZERO,
        }
    }

    /// Build a cart from its lines, computing `total_amount`.
    #[must_use]
    pub fn new(id: CartId, user_id: UserId, items: Vec<CartLine>) -> Self {
        let total_amount = items.iter().map(CartLine::line_total).sum();
        Self {
            id: Some(id),
            user_id: Some(user_id),
            items,
            total_amount,
        }
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One product in a cart.
///
/// `price` is the unit price captured when the line was first added.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartItemId,
    pub product: CartProduct,
    pub quantity: i32,
    pub price: Decimal,
}

impl CartLine {
    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Product fields shown alongside a cart line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartProduct {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub stock: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: i32, price: Decimal, quantity: i32) -> CartLine {
        CartLine {
            id: CartItemId::new(id),
            product: CartProduct {
                id: ProductId::new(id),
                name: format!("Product {id}"),
                slug: format!("product-{id}"),
                image: None,
                price,
                stock: 10,
            },
            quantity,
            price,
        }
    }

    #[test]
    fn test_total_amount_sums_lines() {
        let cart = Cart::new(
            CartId::new(1),
            UserId::new(7),
            vec![line(1, Decimal::new(1999, 2), 2), line(2, Decimal::new(500, 2), 1)],
        );
        assert_eq!(cart.total_amount, Decimal::new(4498, 2));
    }

    #[test]
    fn test_empty_cart_shape() {
        let json = serde_json::to_value(Cart::empty()).unwrap();
        assert_eq!(json, serde_json::json!({ "items": [], "totalAmount": "0" }));
    }

    #[test]
    fn test_cart_with_no_lines_is_empty() {
        let cart = Cart::new(CartId::new(1), UserId::new(7), Vec::new());
        assert!(cart.is_empty());
        assert_eq!(cart.total_amount, Decimal::ZERO);
    }
}
