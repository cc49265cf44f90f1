//! Review routes.

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::{info, instrument};

use shopfront_core::{ProductId, ReviewId};

use crate::db::ReviewRepository;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAuth;
use crate::models::{NewReview, Review, ReviewableItem};
use crate::services::reviews;
use crate::state::AppState;

/// `GET /api/products/{id}/reviews`
pub async fn for_product(
    State(state): State<AppState>,
    ApiPath(product_id): ApiPath<ProductId>,
) -> Result<Json<Vec<Review>>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok(Json(reviews))
}

/// `POST /api/products/{id}/reviews`
#[instrument(skip(state, user, review), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(product_id): ApiPath<ProductId>,
    ApiJson(review): ApiJson<NewReview>,
) -> Result<(StatusCode, Json<Review>)> {
    let review = reviews::submit(state.pool(), user.id, product_id, review).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// `POST /api/reviews/{id}/helpful`
pub async fn helpful(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<ReviewId>,
) -> Result<Json<Value>> {
    let helpful = ReviewRepository::new(state.pool())
        .mark_helpful(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))?;

    info!(review_id = %id, user_id = %user.id, helpful, "Review marked helpful");
    Ok(Json(json!({ "helpful": helpful })))
}

/// `GET /api/reviews/reviewable`
pub async fn reviewable(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<ReviewableItem>>> {
    let items = ReviewRepository::new(state.pool())
        .reviewable(user.id)
        .await?;
    Ok(Json(items))
}
