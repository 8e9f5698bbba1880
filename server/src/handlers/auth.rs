use axum::extract::State;
use axum::response::Response;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

use super::record_audit;
use crate::auth::{hash_password, verify_password};
use crate::models::user::{AuthResponse, LoginRequest, RefreshRequest, RegisterRequest};
use crate::models::{AuditAction, AuditLog, User, UserRole};
use crate::state::AppState;
use crate::store::{RefreshTokenRepo, UserRepo};
use crate::utils::error::{AppError, Result};
use crate::utils::extract::AppJson;
use crate::utils::response::{created, no_content, success};

fn invalid_credentials() -> AppError {
    AppError::AuthError("Invalid login or password".to_string())
}

/// Access token plus a freshly stored refresh token.
async fn start_session(state: &AppState, user: User, now: DateTime<Utc>) -> Result<AuthResponse> {
    let (access_token, expires_at) = state.tokens.issue(&user, now)?;
    let refresh = state
        .store
        .create_refresh_token(state.tokens.refresh_token_for(user.id, now))
        .await?;
    Ok(AuthResponse {
        access_token,
        refresh_token: refresh.token,
        expires_at,
        user: user.into(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    AppJson(request): AppJson<RegisterRequest>,
) -> Result<Response> {
    request.validate()?;
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: request.email.trim().to_string(),
        username: request.username.trim().to_string(),
        first_name: request.first_name,
        second_name: request.second_name,
        profile_image: None,
        role: UserRole::User,
        password_hash: hash_password(&request.password)?,
        registered_at: now,
        updated_at: now,
    };
    let user = state.store.create_user(user).await?;
    tracing::info!(user_id = %user.id, "User registered");
    record_audit(
        &state,
        AuditLog::new("User", user.id, AuditAction::Create, Some(user.id)),
    )
    .await;

    let session = start_session(&state, user, now).await?;
    Ok(created(session, "Registration successful"))
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> Result<Response> {
    request.validate()?;
    let user = state
        .store
        .find_user_by_login(request.login.trim())
        .await?
        .ok_or_else(invalid_credentials)?;
    if !verify_password(&request.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(invalid_credentials());
    }

    tracing::info!(user_id = %user.id, "User logged in");
    record_audit(
        &state,
        AuditLog::new("User", user.id, AuditAction::Login, Some(user.id)),
    )
    .await;

    let session = start_session(&state, user, Utc::now()).await?;
    Ok(success(session, "Login successful"))
}

pub async fn refresh(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> Result<Response> {
    let now = Utc::now();
    let presented = state
        .store
        .get_refresh_token(&request.refresh_token)
        .await?
        .filter(|token| token.is_active(now))
        .ok_or_else(|| AppError::AuthError("Refresh token is invalid or expired".to_string()))?;
    let user = state
        .store
        .get_user(presented.user_id)
        .await?
        .ok_or_else(|| AppError::AuthError("Account no longer exists".to_string()))?;

    let replacement = state
        .store
        .rotate_refresh_token(
            &presented.token,
            state.tokens.refresh_token_for(user.id, now),
            now,
        )
        .await?;
    let (access_token, expires_at) = state.tokens.issue(&user, now)?;
    tracing::debug!(user_id = %user.id, "Refresh token rotated");

    let session = AuthResponse {
        access_token,
        refresh_token: replacement.token,
        expires_at,
        user: user.into(),
    };
    Ok(success(session, "Token refreshed"))
}

/// Revokes the presented refresh token. Unknown tokens are not an error.
pub async fn logout(
    State(state): State<AppState>,
    AppJson(request): AppJson<RefreshRequest>,
) -> Result<Response> {
    let revoked = state
        .store
        .revoke_refresh_token(&request.refresh_token, Utc::now())
        .await?;
    tracing::debug!(revoked, "Logout");
    Ok(no_content())
}
