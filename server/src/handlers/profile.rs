use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use validator::Validate;

use crate::auth::{hash_password, verify_password, AuthUser};
use crate::models::user::{ChangePasswordRequest, UpdateProfileRequest, UserResponse};
use crate::models::User;
use crate::state::AppState;
use crate::store::{RefreshTokenRepo, UserRepo};
use crate::utils::error::{AppError, Result};
use crate::utils::extract::AppJson;
use crate::utils::response::{empty_success, success};

async fn current_user(state: &AppState, caller: &AuthUser) -> Result<User> {
    state
        .store
        .get_user(caller.id)
        .await?
        .ok_or_else(|| AppError::not_found("User", caller.id))
}

pub async fn get_profile(State(state): State<AppState>, caller: AuthUser) -> Result<Response> {
    let user = current_user(&state, &caller).await?;
    Ok(success(UserResponse::from(user), "Profile retrieved"))
}

pub async fn update_profile(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(request): AppJson<UpdateProfileRequest>,
) -> Result<Response> {
    request.validate()?;
    let mut user = current_user(&state, &caller).await?;
    request.apply_to(&mut user, Utc::now());
    let user = state.store.update_user(&user).await?;
    tracing::info!(user_id = %user.id, "Profile updated");
    Ok(success(UserResponse::from(user), "Profile updated"))
}

/// Changing the password signs the account out everywhere else.
pub async fn change_password(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(request): AppJson<ChangePasswordRequest>,
) -> Result<Response> {
    request.validate()?;
    let mut user = current_user(&state, &caller).await?;
    if !verify_password(&request.current_password, &user.password_hash)? {
        return Err(AppError::AuthError("Current password is incorrect".to_string()));
    }

    let now = Utc::now();
    user.password_hash = hash_password(&request.new_password)?;
    user.updated_at = now;
    state.store.update_user(&user).await?;
    let revoked = state.store.revoke_user_refresh_tokens(user.id, now).await?;
    tracing::info!(user_id = %user.id, revoked, "Password changed");

    Ok(empty_success("Password changed"))
}
