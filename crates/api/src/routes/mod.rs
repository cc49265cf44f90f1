//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//!
//! # Auth
//! POST /api/auth/register               - Create account and log in
//! POST /api/auth/login                  - Log in
//! POST /api/auth/logout                 - Log out
//! GET  /api/auth/me                     - Current profile
//! PUT  /api/auth/me                     - Update profile
//!
//! # Products
//! GET  /api/products                    - Paged listing with filters
//! GET  /api/products/categories         - Distinct categories
//! GET  /api/products/{idOrSlug}         - Product detail
//! POST /api/products                    - Create (admin)
//! PUT  /api/products/{id}               - Update (admin)
//! DELETE /api/products/{id}             - Delete (admin)
//! GET  /api/products/{id}/reviews       - Reviews, newest first
//! POST /api/products/{id}/reviews       - Write a review
//!
//! # Reviews
//! POST /api/reviews/{id}/helpful        - Upvote a review
//! GET  /api/reviews/reviewable          - Delivered products to review
//!
//! # Cart
//! GET  /api/cart                        - Current cart
//! POST /api/cart                        - Add item
//! DELETE /api/cart                      - Clear cart
//! PUT  /api/cart/{itemId}               - Set quantity
//! DELETE /api/cart/{itemId}             - Remove item
//!
//! # Orders
//! POST /api/orders                      - Checkout
//! GET  /api/orders                      - Order history
//! GET  /api/orders/{id}                 - Order detail
//! POST /api/orders/{id}/cancel          - Cancel
//!
//! # Payments
//! POST /api/payment/paypal              - Create PayPal payment
//! POST /api/payment/paypal/execute      - Execute PayPal payment
//! POST /api/payment/vnpay               - Signed VNPay URL
//! GET  /api/payment/vnpay/return        - Verify VNPay return
//!
//! # Admin
//! GET  /api/admin/dashboard             - Counts, low stock, recent orders
//! GET  /api/admin/orders                - All orders
//! PUT  /api/admin/orders/{id}/status    - Change status
//! DELETE /api/admin/orders/{id}         - Delete order
//! GET  /api/admin/reports/sales         - Sales report
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod payment;
pub mod products;
pub mod reviews;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, header},
    routing::{get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, request_id_middleware,
};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me).put(auth::update_me))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/categories", get(products::categories))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
        .route(
            "/{id}/reviews",
            get(reviews::for_product).post(reviews::create),
        )
}

/// Create the review routes router.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/reviewable", get(reviews::reviewable))
        .route("/{id}/helpful", post(reviews::helpful))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(cart::show).post(cart::add).delete(cart::clear),
        )
        .route("/{item_id}", put(cart::update).delete(cart::remove))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/paypal", post(payment::paypal_create))
        .route("/paypal/execute", post(payment::paypal_execute))
        .route("/vnpay", post(payment::vnpay_create))
        .route("/vnpay/return", get(payment::vnpay_return))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/orders", get(admin::orders))
        .route("/orders/{id}", axum::routing::delete(admin::delete_order))
        .route("/orders/{id}/status", put(admin::update_status))
        .route("/reports/sales", get(admin::sales_report))
}

/// All `/api` routes, rate limited per client IP.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/products", product_routes())
        .nest("/reviews", review_routes())
        .nest("/cart", cart_routes())
        .nest("/orders", order_routes())
        .nest("/payment", payment_routes())
        .nest("/admin", admin_routes())
        .layer(api_rate_limiter())
}

/// Build the full application router with its middleware stack.
///
/// Sentry layers and connect info are added by the binary.
pub fn router(state: AppState) -> Router {
    let session_layer = create_session_layer(state.pool(), state.config());
    let cors = cors_layer(state.config());

    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .nest("/api", api_routes())
        .fallback(not_found)
        .layer(session_layer)
        .layer(cors)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}

/// CORS for the storefront UI. Credentials are allowed so the session
/// cookie travels with cross-origin requests.
///
/// Only a matching `Origin` is echoed back; other origins get no
/// `Access-Control-Allow-Origin` header at all.
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let origin = match HeaderValue::from_str(&config.cors_origin) {
        Ok(value) => AllowOrigin::list([value]),
        Err(e) => {
            tracing::warn!(origin = %config.cors_origin, error = %e, "Invalid CORS origin, cross-origin requests disabled");
            AllowOrigin::list([])
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> Result<&'static str, AppError> {
    crate::db::ping(state.pool()).await.map_err(|e| {
        tracing::warn!(error = %e, "Readiness check failed");
        AppError::ServiceUnavailable("Database unavailable".to_string())
    })?;
    Ok("ok")
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}
