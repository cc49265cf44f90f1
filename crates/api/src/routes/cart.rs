//! Cart routes.
//!
//! The cart belongs to the logged-in user. It is created on the first add
//! and deleted by checkout or an explicit clear.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use shopfront_core::{CartItemId, ProductId};

use crate::db::{CartRepository, ProductRepository};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::Cart;
use crate::models::cart::MAX_LINE_QUANTITY;
use crate::state::AppState;

/// Body of `POST /api/cart`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

const fn default_quantity() -> i32 {
    1
}

/// Body of `PUT /api/cart/{itemId}`.
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

fn too_many() -> AppError {
    AppError::BadRequest(format!("Quantity cannot exceed {MAX_LINE_QUANTITY}"))
}

fn check_quantity(quantity: i32) -> Result<i32> {
    if quantity < 1 {
        return Err(AppError::BadRequest(
            "Quantity must be at least 1".to_string(),
        ));
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(too_many());
    }
    Ok(quantity)
}

/// `GET /api/cart`
pub async fn show(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<Cart>> {
    let cart = CartRepository::new(state.pool()).get(user.id).await?;
    Ok(Json(cart.unwrap_or_else(Cart::empty)))
}

/// `POST /api/cart`
///
/// A new line snapshots the product's current price; adding a product that
/// is already in the cart only raises its quantity, up to
/// [`MAX_LINE_QUANTITY`].
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<(StatusCode, Json<Cart>)> {
    let quantity = check_quantity(body.quantity)?;

    let product = ProductRepository::new(state.pool())
        .get_active(body.product_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let cart = CartRepository::new(state.pool())
        .add_item(user.id, product.id, quantity, product.effective_price())
        .await?
        .ok_or_else(too_many)?;

    add_breadcrumb(
        "cart",
        "Added item",
        Some(&[("product_id", &product.id.to_string())]),
    );
    info!(product_id = %product.id, quantity, "Added to cart");
    Ok((StatusCode::CREATED, Json(cart)))
}

/// `PUT /api/cart/{itemId}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(item_id): ApiPath<CartItemId>,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> Result<Json<Cart>> {
    let quantity = check_quantity(body.quantity)?;
    let carts = CartRepository::new(state.pool());

    let cart_id = carts
        .cart_id_for(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

    if !carts.set_quantity(cart_id, item_id, quantity).await? {
        return Err(AppError::NotFound("Item not found in cart".to_string()));
    }

    Ok(Json(carts.load(cart_id, user.id).await?))
}

/// `DELETE /api/cart/{itemId}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(item_id): ApiPath<CartItemId>,
) -> Result<Json<Cart>> {
    let carts = CartRepository::new(state.pool());

    let cart_id = carts
        .cart_id_for(user.id)
        .await?
        .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

    carts.remove_item(cart_id, item_id).await?;
    Ok(Json(carts.load(cart_id, user.id).await?))
}

/// `DELETE /api/cart`
pub async fn clear(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<Value>> {
    CartRepository::new(state.pool()).clear(user.id).await?;
    Ok(Json(json!({ "message": "Cart cleared" })))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quantity_defaults_to_one() {
        let body: AddItemRequest = serde_json::from_str(r#"{"productId":7}"#).unwrap();
        assert_eq!(body.product_id, ProductId::new(7));
        assert_eq!(body.quantity, 1);
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(check_quantity(1).is_ok());
        assert!(matches!(check_quantity(0), Err(AppError::BadRequest(_))));
        assert!(matches!(check_quantity(-3), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_quantity_is_capped() {
        assert_eq!(check_quantity(MAX_LINE_QUANTITY).unwrap(), 999);
        assert!(matches!(check_quantity(1000), Err(AppError::BadRequest(_))));
        let Err(AppError::BadRequest(message)) = check_quantity(i32::MAX) else {
            panic!("expected a bad request");
        };
        assert_eq!(message, "Quantity cannot exceed 999");
    }
}
