use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{load_event, load_visible_event, notify};
use crate::auth::AuthUser;
use crate::models::attendee::RegisterAttendeeRequest;
use crate::models::{EventAttendee, Notification, NotificationType};
use crate::state::AppState;
use crate::store::AttendeeRepo;
use crate::utils::error::{AppError, Result};
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{created, success};

async fn load_attendee(state: &AppState, id: Uuid) -> Result<EventAttendee> {
    state
        .store
        .get_attendee(id)
        .await?
        .ok_or_else(|| AppError::not_found("Registration", id))
}

async fn ensure_event_staff(
    state: &AppState,
    caller: &AuthUser,
    attendee: &EventAttendee,
) -> Result<()> {
    let event = load_event(state, attendee.event_id).await?;
    caller.ensure_can_manage(event.created_by)
}

pub async fn register(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(request): AppJson<RegisterAttendeeRequest>,
) -> Result<Response> {
    request.validate()?;
    let event = load_visible_event(&state, Some(&caller), request.event_id).await?;
    let attendee = state
        .store
        .register_attendee(request.event_id, caller.id, request.notes, Utc::now())
        .await?;
    tracing::info!(
        attendee_id = %attendee.id,
        event_id = %attendee.event_id,
        "Attendee registered"
    );

    notify(
        &state,
        Notification::new(
            caller.id,
            NotificationType::EventRegistration,
            "Registration confirmed",
            format!("You are registered for \"{}\".", event.title),
        )
        .for_event(event.id),
    )
    .await;
    Ok(created(attendee, "Registered for event"))
}

pub async fn my_registrations(
    State(state): State<AppState>,
    caller: AuthUser,
) -> Result<Response> {
    let attendees = state.store.list_attendees(None, Some(caller.id)).await?;
    Ok(success(attendees, "Registrations retrieved"))
}

pub async fn get_registration(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let attendee = load_attendee(&state, id).await?;
    if caller.ensure_can_manage(attendee.user_id).is_err() {
        ensure_event_staff(&state, &caller, &attendee).await?;
    }
    Ok(success(attendee, "Registration retrieved"))
}

pub async fn check_in(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let existing = load_attendee(&state, id).await?;
    ensure_event_staff(&state, &caller, &existing).await?;
    let attendee = state.store.check_in_attendee(id, Utc::now()).await?;
    tracing::info!(attendee_id = %attendee.id, "Attendee checked in");
    Ok(success(attendee, "Attendee checked in"))
}

pub async fn cancel(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let existing = load_attendee(&state, id).await?;
    caller.ensure_can_manage(existing.user_id)?;
    let attendee = state.store.cancel_attendee(id, Utc::now()).await?;
    tracing::info!(attendee_id = %attendee.id, "Registration cancelled");
    Ok(success(attendee, "Registration cancelled"))
}

pub async fn mark_no_show(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let existing = load_attendee(&state, id).await?;
    ensure_event_staff(&state, &caller, &existing).await?;
    let attendee = state.store.mark_attendee_no_show(id, Utc::now()).await?;
    tracing::info!(attendee_id = %attendee.id, "Attendee marked as no-show");
    Ok(success(attendee, "Attendee marked as no-show"))
}

pub async fn complete_payment(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let existing = load_attendee(&state, id).await?;
    caller.ensure_can_manage(existing.user_id)?;
    let attendee = state.store.complete_attendee_payment(id, Utc::now()).await?;
    tracing::info!(attendee_id = %attendee.id, "Registration payment completed");
    Ok(success(attendee, "Payment completed"))
}
