//! Verified-purchase reviews.

use sqlx::PgPool;
use thiserror::Error;

use shopfront_core::{ProductId, UserId};

use crate::db::RepositoryError;
use crate::db::reviews::{ReviewOutcome, ReviewRepository};
use crate::models::review::{NewReview, Review};

#[derive(Debug, Error)]
pub enum ReviewError {
    /// A field failed validation; holds the client-facing message.
    #[error("{0}")]
    Invalid(String),

    #[error("Product not found")]
    ProductNotFound,

    #[error("You can only review products from delivered orders")]
    NotEligible,

    #[error("You have already reviewed this product")]
    AlreadyReviewed,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Write a review for `product_id` on behalf of `user_id`.
///
/// # Errors
///
/// Returns `ReviewError::Invalid` for bad input, the eligibility variants when
/// the purchase cannot be verified, or `ReviewError::Repository` on database
/// failure.
pub async fn submit(
    pool: &PgPool,
    user_id: UserId,
    product_id: ProductId,
    mut review: NewReview,
) -> Result<Review, ReviewError> {
    review.normalize().map_err(ReviewError::Invalid)?;

    match ReviewRepository::new(pool)
        .create(user_id, product_id, &review)
        .await?
    {
        ReviewOutcome::Created(review) => Ok(review),
        ReviewOutcome::ProductNotFound => Err(ReviewError::ProductNotFound),
        ReviewOutcome::NotEligible => Err(ReviewError::NotEligible),
        ReviewOutcome::AlreadyReviewed => Err(ReviewError::AlreadyReviewed),
    }
}
