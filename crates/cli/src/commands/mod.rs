//! CLI command implementations.

pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use thiserror::Error;

/// The connection string could not be found.
#[derive(Debug, Error)]
#[error("Missing environment variable: SHOPFRONT_DATABASE_URL (or DATABASE_URL)")]
pub struct MissingDatabaseUrl;

/// Read the database URL, preferring `SHOPFRONT_DATABASE_URL` over `DATABASE_URL`.
///
/// Loads `.env` first so commands behave like the server.
pub fn database_url() -> Result<SecretString, MissingDatabaseUrl> {
    dotenvy::dotenv().ok();

    std::env::var("SHOPFRONT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MissingDatabaseUrl)
}
