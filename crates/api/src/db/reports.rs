//! Report source queries.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shopfront_core::{OrderId, ProductId};

use super::RepositoryError;
use crate::services::reports::{ReportLine, ReportOrder};

#[derive(sqlx::FromRow)]
struct DeliveredOrderRow {
    id: OrderId,
    total: Decimal,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct DeliveredLineRow {
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    unit_price: Decimal,
    quantity: i32,
}

/// Repository for reporting queries.
pub struct ReportRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReportRepository<'a> {
    /// Create a new report repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Every delivered order with its lines, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn delivered_orders(&self) -> Result<Vec<ReportOrder>, RepositoryError> {
        // One snapshot for both queries.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let orders = sqlx::query_as::<_, DeliveredOrderRow>(
            r"
            SELECT id, total, created_at
            FROM shop.orders
            WHERE status = 'delivered'
            ORDER BY created_at, id
            ",
        )
        .fetch_all(&mut *tx)
        .await?;

        let lines = sqlx::query_as::<_, DeliveredLineRow>(
            r"
            SELECT oi.order_id, oi.product_id, oi.product_name, oi.unit_price, oi.quantity
            FROM shop.order_item oi
            JOIN shop.orders o ON o.id = oi.order_id
            WHERE o.status = 'delivered'
            ORDER BY oi.id
            ",
        )
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut by_order: HashMap<OrderId, Vec<ReportLine>> = HashMap::new();
        for line in lines {
            by_order.entry(line.order_id).or_default().push(ReportLine {
                product_id: line.product_id,
                name: line.product_name,
                unit_price: line.unit_price,
                quantity: line.quantity,
            });
        }

        Ok(orders
            .into_iter()
            .map(|o| ReportOrder {
                total: o.total,
                created_at: o.created_at,
                lines: by_order.remove(&o.id).unwrap_or_default(),
            })
            .collect())
    }
}
