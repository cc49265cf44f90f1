//! Authentication extractors.
//!
//! The logged-in user lives in the session under `session_keys::CURRENT_USER`.
//! Rejections are JSON so API clients can show the message directly.
//!
//! The role in the session is a snapshot from login, so admin access is
//! always confirmed against the stored user.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tower_sessions::Session;

use shopfront_core::UserRole;

use crate::db::UserRepository;
use crate::models::{CurrentUser, session_keys};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a logged-in user whose stored role is admin.
pub struct RequireAdmin(pub CurrentUser);

/// Error returned when a protected endpoint is called without the right session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// Not logged in.
    Unauthorized,
    /// Logged in, but not an admin.
    Forbidden,
    /// The stored role could not be read.
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authorized, please log in"),
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admin access required"),
            Self::Unavailable => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or(AuthRejection::Unauthorized)
    }
}

/// Decide admin access from the role currently stored for the user.
///
/// A user deleted since login is treated as logged out.
fn authorize_admin(stored_role: Option<UserRole>) -> Result<(), AuthRejection> {
    match stored_role {
        Some(UserRole::Admin) => Ok(()),
        Some(UserRole::Customer) => Err(AuthRejection::Forbidden),
        None => Err(AuthRejection::Unauthorized),
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = current_user(parts)
            .await
            .ok_or(AuthRejection::Unauthorized)?;

        let stored_role = UserRepository::new(state.pool())
            .get_by_id(user.id)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user.id, error = %e, "Failed to load user role");
                AuthRejection::Unavailable
            })?
            .map(|stored| stored.role);

        if let Err(rejection) = authorize_admin(stored_role) {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin hit admin endpoint");
            return Err(rejection);
        }

        Ok(Self(user))
    }
}

/// Store the logged-in user in the session.
///
/// The session ID is cycled first so a pre-login session cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Log out: drop the whole session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
