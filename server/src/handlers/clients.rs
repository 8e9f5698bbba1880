use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;

use super::record_audit;
use crate::auth::AdminUser;
use crate::models::user::{RoleRequest, UserResponse};
use crate::models::{AuditAction, AuditLog};
use crate::state::AppState;
use crate::store::UserRepo;
use crate::utils::error::{AppError, Result};
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{no_content, success};

pub async fn list_clients(State(state): State<AppState>, _admin: AdminUser) -> Result<Response> {
    let users: Vec<UserResponse> = state
        .store
        .list_users()
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();
    Ok(success(users, "Clients retrieved"))
}

pub async fn get_client(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))?;
    Ok(success(UserResponse::from(user), "Client retrieved"))
}

pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<RoleRequest>,
) -> Result<Response> {
    let mut user = state
        .store
        .get_user(id)
        .await?
        .ok_or_else(|| AppError::not_found("User", id))?;
    if user.id == admin.id && request.role != user.role {
        return Err(AppError::BusinessRule(
            "Administrators cannot change their own role".to_string(),
        ));
    }

    user.role = request.role;
    user.updated_at = Utc::now();
    let user = state.store.update_user(&user).await?;
    tracing::info!(user_id = %user.id, role = ?user.role, "Role changed");
    record_audit(
        &state,
        AuditLog::new("User", user.id, AuditAction::Update, Some(admin.id))
            .with_details(format!("role={:?}", user.role)),
    )
    .await;
    Ok(success(UserResponse::from(user), "Role updated"))
}

pub async fn delete_client(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    if id == admin.id {
        return Err(AppError::BusinessRule(
            "Administrators cannot delete their own account".to_string(),
        ));
    }
    if !state.store.delete_user(id).await? {
        return Err(AppError::not_found("User", id));
    }
    tracing::info!(user_id = %id, "Client deleted");
    record_audit(
        &state,
        AuditLog::new("User", id, AuditAction::Delete, Some(admin.id)),
    )
    .await;
    Ok(no_content())
}
