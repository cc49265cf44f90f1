//! Database migration commands.
//!
//! Migrations live in `crates/api/migrations/` and are embedded at compile
//! time, so the binary can be shipped without the SQL files.
//!
//! # Usage
//!
//! ```bash
//! sf-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SHOPFRONT_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string

use thiserror::Error;

use shopfront_api::db;

use super::{MissingDatabaseUrl, database_url};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Required environment variable is missing.
    #[error(transparent)]
    MissingEnvVar(#[from] MissingDatabaseUrl),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// A migration failed to apply.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&url).await?;

    let migrator = sqlx::migrate!("../api/migrations");
    tracing::info!(available = migrator.iter().count(), "Running migrations...");
    migrator.run(&pool).await?;

    tracing::info!("Migrations complete");
    Ok(())
}
