//! Session middleware configuration.
//!
//! `PostgreSQL`-backed sessions using tower-sessions. The store's table is
//! created by the `create_sessions` migration. Cookies are signed with a key
//! derived from `SHOPFRONT_SESSION_SECRET`.

use secrecy::ExposeSecret;
use sha2::{Digest, Sha512};
use sqlx::PgPool;
use tower_sessions::cookie::Key;
use tower_sessions::service::SignedCookie;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::ApiConfig;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "sf_session";

/// Session expiry time in seconds (7 days of inactivity).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Cookie signing key: SHA-512 of the configured secret, which is exactly
/// the 64 bytes `Key` needs.
fn signing_key(config: &ApiConfig) -> Key {
    let digest = Sha512::digest(config.session_secret.expose_secret().as_bytes());
    Key::from(digest.as_slice())
}

/// Create the session layer with `PostgreSQL` store.
#[must_use]
pub fn create_session_layer(
    pool: &PgPool,
    config: &ApiConfig,
) -> SessionManagerLayer<PostgresStore, SignedCookie> {
    let store = PostgresStore::new(pool.clone());

    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.secure_cookies())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
        .with_signed(signing_key(config))
}
