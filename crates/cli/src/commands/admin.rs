//! Store administrator management.
//!
//! Accounts are created through the API's register endpoint; these commands
//! only switch an existing account's role.
//!
//! # Usage
//!
//! ```bash
//! sf-cli admin promote -e owner@example.com
//! sf-cli admin demote -e former@example.com
//! ```
//!
//! Admin endpoints read the stored role on every request, so a demotion
//! takes effect immediately, even for sessions already logged in.

use shopfront_core::{Email, UserRole};
use thiserror::Error;

use shopfront_api::db;

use super::{MissingDatabaseUrl, database_url};

/// Errors that can occur during admin operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Required environment variable is missing.
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No account uses this email.
    #[error("No account found with email: {0}")]
    UserNotFound(String),
}

/// Set the role of the account registered with `email`.
///
/// # Errors
///
/// Returns an error if the email is malformed, no account matches it, or the
/// database is unreachable.
pub async fn set_role(email: &str, role: UserRole) -> Result<(), AdminError> {
    let email = Email::parse(email).map_err(|_| AdminError::InvalidEmail(email.to_owned()))?;

    let url = database_url()?;
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&url).await?;

    let updated = sqlx::query("UPDATE shop.user SET role = $2 WHERE email = $1")
        .bind(email.as_str())
        .bind(role)
        .execute(&pool)
        .await?
        .rows_affected();

    if updated == 0 {
        return Err(AdminError::UserNotFound(email.as_str().to_owned()));
    }

    tracing::info!(email = %email, role = %role, "Role updated");
    Ok(())
}
