//! Database operations for the Shopfront `PostgreSQL` schema.
//!
//! # Schema: `shop`
//!
//! - `user` - Customer and admin accounts (argon2 password hashes)
//! - `product` - Catalogue, stock and derived rating
//! - `cart` / `cart_item` - One cart per user, one line per product
//! - `orders` / `order_item` - Placed orders with line snapshots
//! - `review` - One review per user and product
//!
//! Sessions live in `tower_sessions.session`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p shopfront-cli -- migrate
//! ```
//!
//! Queries are built at runtime with `query_as::<_, Row>` so the crate
//! builds without a live database or an offline query cache.

pub mod carts;
pub mod orders;
pub mod products;
pub mod reports;
pub mod reviews;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use carts::CartRepository;
pub use orders::{OrderRepository, PlaceOrder};
pub use products::{ProductFilter, ProductRepository};
pub use reports::ReportRepository;
pub use reviews::ReviewRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `RepositoryError::Conflict`.
pub(crate) fn conflict_on_unique(message: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(message.to_owned());
        }
        RepositoryError::Database(e)
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Check that the database answers a trivial query.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), RepositoryError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
