//! Order queries, including the checkout transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, instrument, warn};

use shopfront_core::{
    CartId, OrderId, OrderItemId, OrderStatus, OrderTotals, PaymentMethod, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::order::{CustomerInfo, Order, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, customer_name, customer_email, customer_phone, \
    customer_address, customer_city, customer_district, payment_method, status, \
    subtotal, shipping, tax, total, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    customer_name: String,
    customer_email: String,
    customer_phone: String,
    customer_address: String,
    customer_city: String,
    customer_district: String,
    payment_method: PaymentMethod,
    status: OrderStatus,
    subtotal: Decimal,
    shipping: Decimal,
    tax: Decimal,
    total: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            customer: CustomerInfo {
                name: self.customer_name,
                email: self.customer_email,
                phone: self.customer_phone,
                address: self.customer_address,
                city: self.customer_city,
                district: self.customer_district,
            },
            payment_method: self.payment_method,
            status: self.status,
            subtotal: self.subtotal,
            shipping: self.shipping,
            tax: self.tax,
            total: self.total,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    product_image: Option<String>,
    unit_price: Decimal,
    quantity: i32,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            name: r.product_name,
            image: r.product_image,
            price: r.unit_price,
            quantity: r.quantity,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CheckoutLineRow {
    product_id: ProductId,
    quantity: i32,
    name: String,
    image: Option<String>,
    unit_price: Decimal,
    is_active: bool,
}

/// Everything needed to place an order from a user's cart.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub user_id: UserId,
    /// Already validated and trimmed.
    pub customer: CustomerInfo,
    pub payment_method: PaymentMethod,
}

/// Result of the checkout transaction.
#[derive(Debug)]
pub enum PlaceOrderOutcome {
    /// The order was created and the cart emptied.
    Placed(Order),
    /// The user has no cart or it has no lines.
    EmptyCart,
    /// A product no longer has enough stock; nothing was written.
    InsufficientStock(String),
    /// A product in the cart was deactivated; nothing was written.
    Unavailable(String),
}

/// Result of a status change attempt.
#[derive(Debug)]
pub enum StatusChange {
    /// The order moved; holds the updated order.
    Updated(Order),
    /// No such order (or not the caller's).
    NotFound,
    /// The guard refused the move from the contained status.
    Rejected(OrderStatus),
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Turn the user's cart into an order.
    ///
    /// Runs in one transaction: the cart row is locked, each line is priced
    /// at the product's current price, stock is decremented with a guarded
    /// `stock >= quantity` update, the order and its item snapshots are
    /// inserted and the cart is deleted. Any shortage rolls everything back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored line is invalid.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn place(&self, request: &PlaceOrder) -> Result<PlaceOrderOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let cart_id = sqlx::query_scalar::<_, CartId>(
            "SELECT id FROM shop.cart WHERE user_id = $1 FOR UPDATE",
        )
        .bind(request.user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(cart_id) = cart_id else {
            return Ok(PlaceOrderOutcome::EmptyCart);
        };

        // Ordered by product so concurrent checkouts lock products in the
        // same order.
        let lines = sqlx::query_as::<_, CheckoutLineRow>(
            r"
            SELECT ci.product_id, ci.quantity, p.name, p.images[1] AS image,
                   CASE WHEN p.is_on_sale AND p.sale_price IS NOT NULL
                        THEN p.sale_price ELSE p.price END AS unit_price,
                   p.is_active
            FROM shop.cart_item ci
            JOIN shop.product p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.product_id
            ",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        if lines.is_empty() {
            return Ok(PlaceOrderOutcome::EmptyCart);
        }

        for line in &lines {
            if !line.is_active {
                return Ok(PlaceOrderOutcome::Unavailable(line.name.clone()));
            }

            let updated = sqlx::query(
                "UPDATE shop.product SET stock = stock - $2 WHERE id = $1 AND stock >= $2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                warn!(product_id = %line.product_id, quantity = line.quantity, "Insufficient stock at checkout");
                return Ok(PlaceOrderOutcome::InsufficientStock(line.name.clone()));
            }
        }

        let totals = OrderTotals::from_lines(lines.iter().map(|l| (l.unit_price, l.quantity)))
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid cart line: {e}")))?;
        let status = OrderStatus::initial_for(request.payment_method);
        let customer = &request.customer;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO shop.orders (
                user_id, customer_name, customer_email, customer_phone, customer_address,
                customer_city, customer_district, payment_method, status,
                subtotal, shipping, tax, total
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(request.user_id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .bind(&customer.city)
        .bind(&customer.district)
        .bind(request.payment_method)
        .bind(status)
        .bind(totals.subtotal)
        .bind(totals.shipping)
        .bind(totals.tax)
        .bind(totals.total)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = sqlx::query_as::<_, OrderItemRow>(
                r"
                INSERT INTO shop.order_item
                    (order_id, product_id, product_name, product_image, unit_price, quantity)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING id, order_id, product_id, product_name, product_image,
                          unit_price, quantity
                ",
            )
            .bind(row.id)
            .bind(line.product_id)
            .bind(&line.name)
            .bind(&line.image)
            .bind(line.unit_price)
            .bind(line.quantity)
            .fetch_one(&mut *tx)
            .await?;
            items.push(OrderItem::from(item));
        }

        sqlx::query("DELETE FROM shop.cart WHERE id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %row.id, total = %totals.total, "Order placed");
        Ok(PlaceOrderOutcome::Placed(row.into_order(items)))
    }

    /// Get an order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// All orders, optionally filtered by status, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_all(&self, status: Option<OrderStatus>) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders
             WHERE $1::shop.order_status IS NULL OR status = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(status)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// The `limit` most recent orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn recent(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders
             ORDER BY created_at DESC, id DESC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        self.with_items(rows).await
    }

    /// Number of orders in each status that has any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_by_status(&self) -> Result<Vec<(OrderStatus, i64)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (OrderStatus, i64)>(
            "SELECT status, COUNT(*) FROM shop.orders GROUP BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Move an order to `next` if `guard(current, next)` allows it.
    ///
    /// When `owner` is set, only that user's order is considered. Moving an
    /// order that holds stock to a status that does not returns the items to
    /// stock in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, guard))]
    pub async fn transition(
        &self,
        id: OrderId,
        owner: Option<UserId>,
        next: OrderStatus,
        guard: fn(OrderStatus, OrderStatus) -> bool,
    ) -> Result<StatusChange, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = lock_status(&mut tx, id, owner).await? else {
            return Ok(StatusChange::NotFound);
        };

        if !guard(current, next) {
            return Ok(StatusChange::Rejected(current));
        }

        if current.holds_stock() && !next.holds_stock() {
            restock(&mut tx, id).await?;
        }

        sqlx::query("UPDATE shop.orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(next)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        info!(order_id = %id, from = %current, to = %next, "Order status changed");
        self.get(id)
            .await?
            .map(StatusChange::Updated)
            .ok_or(RepositoryError::NotFound)
    }

    /// Move an `awaiting_payment` order to `processing` after a confirmed
    /// payment. Returns whether the order moved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_paid(&self, id: OrderId, owner: Option<UserId>) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE shop.orders
            SET status = 'processing'
            WHERE id = $1
              AND status = 'awaiting_payment'
              AND ($2::int IS NULL OR user_id = $2)
            ",
        )
        .bind(id)
        .bind(owner)
        .execute(self.pool)
        .await?;

        let moved = result.rows_affected() > 0;
        if moved {
            info!(order_id = %id, "Order paid");
        }
        Ok(moved)
    }

    /// Delete an order, releasing its stock if it still holds any.
    /// Returns whether an order was deleted.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = lock_status(&mut tx, id, None).await? else {
            return Ok(false);
        };

        if current.holds_stock() {
            restock(&mut tx, id).await?;
        }

        sqlx::query("DELETE FROM shop.orders WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Attach item rows to order rows, keeping the order of `rows`.
    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT id, order_id, product_id, product_name, product_image, unit_price, quantity
            FROM shop.order_item
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in item_rows {
            by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItem::from(item));
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }
}

/// Lock an order row and return its status.
async fn lock_status(
    tx: &mut Transaction<'_, Postgres>,
    id: OrderId,
    owner: Option<UserId>,
) -> Result<Option<OrderStatus>, RepositoryError> {
    let status = sqlx::query_scalar::<_, OrderStatus>(
        r"
        SELECT status FROM shop.orders
        WHERE id = $1 AND ($2::int IS NULL OR user_id = $2)
        FOR UPDATE
        ",
    )
    .bind(id)
    .bind(owner)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(status)
}

/// Return an order's items to product stock.
///
/// Lines whose product was deleted are skipped.
async fn restock(tx: &mut Transaction<'_, Postgres>, id: OrderId) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE shop.product p
        SET stock = p.stock + oi.quantity
        FROM shop.order_item oi
        WHERE oi.order_id = $1 AND oi.product_id = p.id
        ",
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    info!(order_id = %id, products = result.rows_affected(), "Stock released");
    Ok(())
}
