//! Cart queries.
//!
//! A user has at most one cart row; each product appears at most once in it.

use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use shopfront_core::{CartId, CartItemId, ProductId, UserId};

use super::RepositoryError;
use crate::models::cart::{Cart, CartLine, CartProduct, MAX_LINE_QUANTITY};

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: CartItemId,
    quantity: i32,
    price: Decimal,
    product_id: ProductId,
    product_name: String,
    product_slug: String,
    product_image: Option<String>,
    product_price: Decimal,
    product_stock: i32,
}

impl From<CartLineRow> for CartLine {
    fn from(r: CartLineRow) -> Self {
        Self {
            id: r.id,
            product: CartProduct {
                id: r.product_id,
                name: r.product_name,
                slug: r.product_slug,
                image: r.product_image,
                price: r.product_price,
                stock: r.product_stock,
            },
            quantity: r.quantity,
            price: r.price,
        }
    }
}

/// Repository for cart database operations.
pub struct CartRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CartRepository<'a> {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// ID of the user's cart, if they have one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn cart_id_for(&self, user_id: UserId) -> Result<Option<CartId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, CartId>("SELECT id FROM shop.cart WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(id)
    }

    /// The user's cart with lines populated, oldest line first.
    ///
    /// Each line's product price is the price a new line would capture now,
    /// i.e. the sale price while the product is on sale.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        match self.cart_id_for(user_id).await? {
            Some(cart_id) => Ok(Some(self.load(cart_id, user_id).await?)),
            None => Ok(None),
        }
    }

    /// Load a cart's lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn load(&self, cart_id: CartId, user_id: UserId) -> Result<Cart, RepositoryError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.quantity, ci.price,
                   p.id AS product_id, p.name AS product_name, p.slug AS product_slug,
                   p.images[1] AS product_image,
                   CASE WHEN p.is_on_sale AND p.sale_price IS NOT NULL
                        THEN p.sale_price ELSE p.price END AS product_price,
                   p.stock AS product_stock
            FROM shop.cart_item ci
            JOIN shop.product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at, ci.id
            ",
        )
        .bind(cart_id)
        .fetch_all(self.pool)
        .await?;

        Ok(Cart::new(
            cart_id,
            user_id,
            rows.into_iter().map(CartLine::from).collect(),
        ))
    }

    /// Add `quantity` of a product, creating the cart and line as needed.
    ///
    /// A new line captures `unit_price`; an existing line keeps its price and
    /// has `quantity` added. Runs as a single upsert per table so concurrent
    /// adds accumulate.
    ///
    /// Returns `None`, changing nothing, if the line would exceed
    /// [`MAX_LINE_QUANTITY`].
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<Option<Cart>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart_id = sqlx::query_scalar::<_, CartId>(
            r"
            INSERT INTO shop.cart (user_id)
            VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
            RETURNING id
            ",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        // No row comes back when the guard rejects the update.
        let line = sqlx::query_scalar::<_, CartItemId>(
            r"
            INSERT INTO shop.cart_item AS ci (cart_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (cart_id, product_id)
            DO UPDATE SET quantity = ci.quantity + EXCLUDED.quantity
            WHERE ci.quantity + EXCLUDED.quantity <= $5
            RETURNING ci.id
            ",
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price)
        .bind(MAX_LINE_QUANTITY)
        .fetch_optional(&mut *tx)
        .await?;

        if line.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }
        tx.commit().await?;

        self.load(cart_id, user_id).await.map(Some)
    }

    /// Set a line's quantity. Returns whether the line exists in this cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn set_quantity(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.cart_item SET quantity = $3 WHERE cart_id = $1 AND id = $2",
        )
        .bind(cart_id)
        .bind(item_id)
        .bind(quantity)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove a line. Removing a line that is not there is not an error.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn remove_item(
        &self,
        cart_id: CartId,
        item_id: CartItemId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_item WHERE cart_id = $1 AND id = $2")
            .bind(cart_id)
            .bind(item_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete the user's cart and all its lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
