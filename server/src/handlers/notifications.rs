use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AdminUser, AuthUser};
use crate::models::notification::{NotificationQuery, SendNotificationRequest, UnreadCount};
use crate::models::Notification;
use crate::state::AppState;
use crate::store::{NotificationRepo, UserRepo};
use crate::utils::error::{AppError, Result};
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::response::{created, no_content, success};

/// Notifications are private: someone else's id looks like a missing one.
async fn load_own(state: &AppState, caller: &AuthUser, id: Uuid) -> Result<Notification> {
    state
        .store
        .get_notification(id)
        .await?
        .filter(|n| n.user_id == caller.id)
        .ok_or_else(|| AppError::not_found("Notification", id))
}

pub async fn list_notifications(
    State(state): State<AppState>,
    caller: AuthUser,
    AppQuery(query): AppQuery<NotificationQuery>,
) -> Result<Response> {
    let notifications = state
        .store
        .list_notifications(caller.id, query.unread_only)
        .await?;
    Ok(success(notifications, "Notifications retrieved"))
}

pub async fn unread_count(State(state): State<AppState>, caller: AuthUser) -> Result<Response> {
    let unread = state.store.count_unread_notifications(caller.id).await?;
    Ok(success(UnreadCount { unread }, "Unread count retrieved"))
}

pub async fn send_notification(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(request): AppJson<SendNotificationRequest>,
) -> Result<Response> {
    request.validate()?;
    if state.store.get_user(request.user_id).await?.is_none() {
        return Err(AppError::not_found("User", request.user_id));
    }

    let mut notification = Notification::new(
        request.user_id,
        request.notification_type,
        request.title,
        request.message,
    );
    notification.event_id = request.event_id;
    notification.booking_id = request.booking_id;
    let notification = state.store.create_notification(notification).await?;
    tracing::info!(notification_id = %notification.id, user_id = %notification.user_id, "Notification sent");
    Ok(created(notification, "Notification sent"))
}

pub async fn mark_read(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    load_own(&state, &caller, id).await?;
    let notification = state.store.mark_notification_read(id, Utc::now()).await?;
    Ok(success(notification, "Notification marked as read"))
}

pub async fn mark_all_read(State(state): State<AppState>, caller: AuthUser) -> Result<Response> {
    let updated = state
        .store
        .mark_all_notifications_read(caller.id, Utc::now())
        .await?;
    tracing::debug!(user_id = %caller.id, updated, "Notifications marked as read");
    Ok(success(
        serde_json::json!({ "updated": updated }),
        "All notifications marked as read",
    ))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    load_own(&state, &caller, id).await?;
    state.store.delete_notification(id).await?;
    Ok(no_content())
}
