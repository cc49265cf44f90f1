//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"message": "..."}`; server-side failures are captured to Sentry and
//! reported to the client without internal detail.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;
use crate::services::reviews::ReviewError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Checkout or order cancellation failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Review submission failed.
    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    /// Payment gateway operation failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Resource not found. Holds the client-facing message.
    #[error("{0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    /// A dependency is down or unconfigured.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// Rate limited.
    #[error("Too many requests, please try again later")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::InvalidProfile(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(err) => match err {
                CheckoutError::MissingFields | CheckoutError::EmptyCart => StatusCode::BAD_REQUEST,
                CheckoutError::InsufficientStock(_)
                | CheckoutError::Unavailable(_)
                | CheckoutError::NotCancellable(_) => StatusCode::CONFLICT,
                CheckoutError::OrderNotFound => StatusCode::NOT_FOUND,
                CheckoutError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Review(err) => match err {
                ReviewError::Invalid(_) => StatusCode::BAD_REQUEST,
                ReviewError::ProductNotFound => StatusCode::NOT_FOUND,
                ReviewError::NotEligible => StatusCode::FORBIDDEN,
                ReviewError::AlreadyReviewed => StatusCode::CONFLICT,
                ReviewError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Payment(err) => match err {
                PaymentError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
                PaymentError::InvalidAmount(_) | PaymentError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                PaymentError::Http(_)
                | PaymentError::Gateway(_)
                | PaymentError::AuthenticationFailed(_) => StatusCode::BAD_GATEWAY,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the client.
    fn client_message(&self) -> String {
        let status = self.status();
        if status.is_server_error() {
            return match self {
                Self::Payment(PaymentError::NotConfigured(gateway)) => {
                    format!("{gateway} payments are not available")
                }
                Self::Payment(_) => "Payment gateway error".to_string(),
                Self::ServiceUnavailable(msg) => msg.clone(),
                _ => "Internal server error".to_string(),
            };
        }

        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg))
            | Self::Payment(
                PaymentError::InvalidAmount(msg) | PaymentError::InvalidRequest(msg),
            ) => msg.clone(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::UserNotFound => {
                    "Invalid credentials".to_string()
                }
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) | AuthError::InvalidProfile(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                _ => "Authentication error".to_string(),
            },
            Self::Checkout(err) => err.to_string(),
            Self::Review(err) => err.to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status.is_client_error() {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(json!({ "message": self.client_message() }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a customer action.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn render(err: AppError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        (status, json["message"].as_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_not_found_keeps_message() {
        let (status, message) = render(AppError::NotFound("Product not found".to_string())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(message, "Product not found");
    }

    #[tokio::test]
    async fn test_internal_details_hidden() {
        let (status, message) = render(AppError::Internal("pool exhausted".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");

        let (status, message) = render(AppError::Database(RepositoryError::DataCorruption(
            "bad row".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }

    #[tokio::test]
    async fn test_repository_conflict_is_409() {
        let (status, message) = render(AppError::Database(RepositoryError::Conflict(
            "A product with this name already exists".to_string(),
        )))
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "A product with this name already exists");
    }

    #[tokio::test]
    async fn test_auth_errors() {
        let (status, message) = render(AuthError::InvalidCredentials.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "Invalid credentials");

        let (status, message) = render(AuthError::UserAlreadyExists.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "An account with this email already exists");

        let (status, _) = render(AuthError::WeakPassword("too short".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_checkout_errors() {
        let (status, message) = render(CheckoutError::EmptyCart.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Your cart is empty");

        let (status, message) =
            render(CheckoutError::InsufficientStock("Canvas Tote".to_string()).into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "Insufficient stock for Canvas Tote");
    }

    #[tokio::test]
    async fn test_review_errors() {
        let (status, message) = render(ReviewError::NotEligible.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(message, "You can only review products from delivered orders");

        let (status, message) = render(ReviewError::AlreadyReviewed.into()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(message, "You have already reviewed this product");
    }

    #[tokio::test]
    async fn test_payment_errors() {
        let (status, message) =
            render(PaymentError::Gateway("HTTP 500 INTERNAL: boom".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(message, "Payment gateway error");

        let (status, message) = render(PaymentError::NotConfigured("VNPay").into()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(message, "VNPay payments are not available");

        let (status, _) =
            render(PaymentError::InvalidAmount("amount must be positive".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_payment_id_is_400() {
        let (status, message) =
            render(PaymentError::InvalidRequest("invalid payment id 'a/b'".to_string()).into())
                .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "invalid payment id 'a/b'");
    }

    #[tokio::test]
    async fn test_service_unavailable_keeps_message() {
        let (status, message) =
            render(AppError::ServiceUnavailable("Database unavailable".to_string())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(message, "Database unavailable");
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let (status, message) = render(AppError::RateLimited).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(message, "Too many requests, please try again later");
    }
}
