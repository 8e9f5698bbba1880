use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{AuditLog, Event, Notification};
use crate::state::AppState;
use crate::store::{AuditRepo, EventRepo, NotificationRepo};
use crate::utils::error::{AppError, Result};
use crate::utils::response::success;

pub mod attendees;
pub mod audit;
pub mod auth;
pub mod bookings;
pub mod clients;
pub mod events;
pub mod menus;
pub mod notifications;
pub mod profile;
pub mod search;
pub mod venues;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "eventdesk-api",
    };

    success(payload, "Health check successful")
}

pub(crate) async fn load_event(state: &AppState, id: Uuid) -> Result<Event> {
    state
        .store
        .get_event(id)
        .await?
        .ok_or_else(|| AppError::not_found("Event", id))
}

/// Private events look missing to everyone but their managers.
pub(crate) async fn load_visible_event(
    state: &AppState,
    caller: Option<&AuthUser>,
    id: Uuid,
) -> Result<Event> {
    let event = load_event(state, id).await?;
    let visible =
        event.is_public || caller.is_some_and(|user| ensure_event_manager(user, &event).is_ok());
    if visible {
        Ok(event)
    } else {
        Err(AppError::not_found("Event", id))
    }
}

/// The event creator or an admin.
pub(crate) fn ensure_event_manager(user: &AuthUser, event: &Event) -> Result<()> {
    user.ensure_can_manage(event.created_by)
}

/// Audit records are best effort: a failed append is logged, the request still succeeds.
pub(crate) async fn record_audit(state: &AppState, entry: AuditLog) {
    let entity = entry.entity_name.clone();
    if let Err(e) = state.store.append_audit(entry).await {
        tracing::warn!(error = %e, entity = %entity, "Failed to append audit record");
    }
}

pub(crate) async fn notify(state: &AppState, notification: Notification) {
    let user_id = notification.user_id;
    if let Err(e) = state.store.create_notification(notification).await {
        tracing::warn!(error = %e, user_id = %user_id, "Failed to store notification");
    }
}
