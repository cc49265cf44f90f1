//! Account routes: register, login, logout and the caller's profile.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::extract::ApiJson;
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, ProfileUpdate, User};
use crate::services::auth::{AuthService, Registration};
use crate::state::AppState;

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    let current = CurrentUser {
        id: user.id,
        email: user.email.clone(),
        role: user.role,
    };
    set_current_user(session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// `POST /api/auth/register`
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<Registration>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.pool()).register(&form).await?;
    start_session(&session, &user).await?;

    info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/auth/login`
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(form): ApiJson<LoginRequest>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await?;
    start_session(&session, &user).await?;

    info!(user_id = %user.id, "User logged in");
    Ok(Json(user))
}

/// `POST /api/auth/logout`
pub async fn logout(session: Session) -> Result<Json<Value>> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    clear_sentry_user();
    Ok(Json(json!({ "message": "Logged out" })))
}

/// `GET /api/auth/me`
pub async fn me(State(state): State<AppState>, RequireAuth(user): RequireAuth) -> Result<Json<User>> {
    let user = AuthService::new(state.pool()).get_user(user.id).await?;
    Ok(Json(user))
}

/// `PUT /api/auth/me`
#[instrument(skip(state, user, update), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<User>> {
    let user = AuthService::new(state.pool())
        .update_profile(user.id, &update)
        .await?;
    Ok(Json(user))
}
