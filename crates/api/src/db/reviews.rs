//! Review queries and product rating upkeep.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, instrument};

use shopfront_core::{OrderId, ProductId, ReviewId, UserId, average_rating};

use super::RepositoryError;
use crate::models::review::{NewReview, Review, ReviewableItem};

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    user_name: String,
    order_id: Option<OrderId>,
    rating: i16,
    title: String,
    comment: String,
    helpful: i32,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(r: ReviewRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            user_id: r.user_id,
            user_name: r.user_name,
            order_id: r.order_id,
            rating: r.rating,
            title: r.title,
            comment: r.comment,
            helpful: r.helpful,
            created_at: r.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewableRow {
    order_id: OrderId,
    product_id: ProductId,
    product_name: String,
    product_image: Option<String>,
    delivered_at: DateTime<Utc>,
    reviewed: bool,
}

/// Result of writing a review.
#[derive(Debug)]
pub enum ReviewOutcome {
    /// The review was stored and the product rating refreshed.
    Created(Review),
    /// The product does not exist.
    ProductNotFound,
    /// The order is not the caller's, not delivered, or lacks the product.
    NotEligible,
    /// The caller already reviewed this product.
    AlreadyReviewed,
}

/// Repository for review database operations.
pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.name AS user_name, r.order_id,
                   r.rating, r.title, r.comment, r.helpful, r.created_at
            FROM shop.review r
            JOIN shop.user u ON u.id = r.user_id
            WHERE r.product_id = $1
            ORDER BY r.created_at DESC, r.id DESC
            ",
        )
        .bind(product_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Review::from).collect())
    }

    /// Store a review and recompute the product's rating and review count
    /// in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    #[instrument(skip(self, review), fields(order_id = %review.order_id, rating = review.rating))]
    pub async fn create(
        &self,
        user_id: UserId,
        product_id: ProductId,
        review: &NewReview,
    ) -> Result<ReviewOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Lock the product so concurrent reviews recompute the rating in turn.
        let product = sqlx::query_scalar::<_, ProductId>(
            "SELECT id FROM shop.product WHERE id = $1 FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        if product.is_none() {
            return Ok(ReviewOutcome::ProductNotFound);
        }

        let eligible: bool = sqlx::query_scalar(
            r"
            SELECT EXISTS (
                SELECT 1
                FROM shop.orders o
                JOIN shop.order_item oi ON oi.order_id = o.id
                WHERE o.id = $1 AND o.user_id = $2 AND o.status = 'delivered'
                  AND oi.product_id = $3
            )
            ",
        )
        .bind(review.order_id)
        .bind(user_id)
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;
        if !eligible {
            return Ok(ReviewOutcome::NotEligible);
        }

        let inserted = sqlx::query_scalar::<_, ReviewId>(
            r"
            INSERT INTO shop.review (product_id, user_id, order_id, rating, title, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (product_id, user_id) DO NOTHING
            RETURNING id
            ",
        )
        .bind(product_id)
        .bind(user_id)
        .bind(review.order_id)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.comment)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(review_id) = inserted else {
            return Ok(ReviewOutcome::AlreadyReviewed);
        };

        let ratings = sqlx::query_scalar::<_, i16>(
            "SELECT rating FROM shop.review WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?;
        let rating: Decimal = average_rating(&ratings);
        let count = i32::try_from(ratings.len())
            .map_err(|_| RepositoryError::DataCorruption("review count overflow".to_string()))?;

        sqlx::query("UPDATE shop.product SET rating = $2, num_reviews = $3 WHERE id = $1")
            .bind(product_id)
            .bind(rating)
            .bind(count)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, ReviewRow>(
            r"
            SELECT r.id, r.product_id, r.user_id, u.name AS user_name, r.order_id,
                   r.rating, r.title, r.comment, r.helpful, r.created_at
            FROM shop.review r
            JOIN shop.user u ON u.id = r.user_id
            WHERE r.id = $1
            ",
        )
        .bind(review_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(review_id = %review_id, product_id = %product_id, %rating, "Review created");
        Ok(ReviewOutcome::Created(Review::from(row)))
    }

    /// Increment a review's helpful counter, returning the new count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn mark_helpful(&self, id: ReviewId) -> Result<Option<i32>, RepositoryError> {
        let helpful = sqlx::query_scalar::<_, i32>(
            "UPDATE shop.review SET helpful = helpful + 1 WHERE id = $1 RETURNING helpful",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;
        Ok(helpful)
    }

    /// Products from the user's delivered orders, with whether each has
    /// been reviewed. Newest orders first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn reviewable(&self, user_id: UserId) -> Result<Vec<ReviewableItem>, RepositoryError> {
        let rows = sqlx::query_as::<_, ReviewableRow>(
            r"
            SELECT o.id AS order_id, oi.product_id AS product_id, oi.product_name,
                   oi.product_image, o.updated_at AS delivered_at,
                   EXISTS (
                       SELECT 1 FROM shop.review r
                       WHERE r.user_id = o.user_id AND r.product_id = oi.product_id
                   ) AS reviewed
            FROM shop.orders o
            JOIN shop.order_item oi ON oi.order_id = o.id
            WHERE o.user_id = $1 AND o.status = 'delivered' AND oi.product_id IS NOT NULL
            ORDER BY o.updated_at DESC, o.id DESC, oi.id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ReviewableItem {
                order_id: r.order_id,
                product_id: r.product_id,
                name: r.product_name,
                image: r.product_image,
                delivered_at: r.delivered_at,
                reviewed: r.reviewed,
            })
            .collect())
    }
}
