//! Product review types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use shopfront_core::{OrderId, ProductId, ReviewId, UserId, validate_rating};

/// Longest review body accepted.
pub const MAX_COMMENT_CHARS: usize = 1000;

/// A published review.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub user_name: String,
    pub order_id: Option<OrderId>,
    pub rating: i16,
    pub title: String,
    pub comment: String,
    pub helpful: i32,
    pub created_at: DateTime<Utc>,
}

/// Payload for writing a review.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub order_id: OrderId,
    pub rating: i16,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub comment: String,
}

impl NewReview {
    /// Trim and validate the review text and rating.
    ///
    /// # Errors
    ///
    /// Returns a client-facing message for the first invalid field.
    pub fn normalize(&mut self) -> Result<(), String> {
        validate_rating(self.rating).map_err(|_| "Rating must be between 1 and 5".to_string())?;

        self.title = self.title.trim().to_string();
        self.comment = self.comment.trim().to_string();

        if self.title.is_empty() {
            return Err("Review title is required".to_string());
        }
        if self.comment.is_empty() {
            return Err("Review comment is required".to_string());
        }
        if self.comment.chars().count() > MAX_COMMENT_CHARS {
            return Err(format!(
                "Review comment cannot exceed {MAX_COMMENT_CHARS} characters"
            ));
        }
        Ok(())
    }
}

/// A product from one of the caller's delivered orders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewableItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    pub image: Option<String>,
    pub delivered_at: DateTime<Utc>,
    pub reviewed: bool,
}
