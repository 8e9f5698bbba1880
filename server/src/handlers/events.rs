use std::collections::HashSet;

use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;

use super::{ensure_event_manager, load_event, load_visible_event, notify, record_audit};
use crate::auth::AuthUser;
use crate::models::booking::BookingFilter;
use crate::models::event::{EventFilter, EventQuery, EventRequest, EventStatusRequest};
use crate::models::menu::MenuQuery;
use crate::models::{AuditAction, AuditLog, Event, EventStatus, Notification, NotificationType};
use crate::state::AppState;
use crate::store::{AttendeeRepo, BookingRepo, EventRepo, MenuRepo, VenueRepo};
use crate::utils::error::{AppError, Result};
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::response::{created, no_content, success};

async fn ensure_venue_usable(state: &AppState, venue_id: Option<Uuid>) -> Result<()> {
    let Some(venue_id) = venue_id else {
        return Ok(());
    };
    match state.store.get_venue(venue_id).await? {
        None => Err(AppError::ValidationError(format!(
            "venueId '{}' does not reference an existing venue",
            venue_id
        ))),
        Some(venue) if !venue.is_active => Err(AppError::BusinessRule(format!(
            "Venue '{}' is no longer active",
            venue.name
        ))),
        Some(_) => Ok(()),
    }
}

/// Tells everyone holding an active booking that the event is off.
async fn notify_cancellation(state: &AppState, event: &Event) -> Result<()> {
    let filter = BookingFilter {
        event_id: Some(event.id),
        ..Default::default()
    };
    let mut notified = HashSet::new();
    for booking in state.store.list_bookings(&filter).await? {
        if !booking.is_active() || !notified.insert(booking.user_id) {
            continue;
        }
        let notification = Notification::new(
            booking.user_id,
            NotificationType::EventCancelled,
            "Event cancelled",
            format!("\"{}\" has been cancelled.", event.title),
        )
        .for_event(event.id)
        .for_booking(booking.id);
        notify(state, notification).await;
    }
    tracing::info!(event_id = %event.id, recipients = notified.len(), "Cancellation notices sent");
    Ok(())
}

pub async fn list_events(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    AppQuery(query): AppQuery<EventQuery>,
) -> Result<Response> {
    let filter = EventFilter {
        status: query.status,
        category: query.category,
        venue_id: query.venue_id,
        starts_after: query.upcoming.then(Utc::now),
        public_only: !caller.as_ref().is_some_and(AuthUser::is_admin),
        ..Default::default()
    };
    let events = state.store.list_events(&filter).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn my_events(State(state): State<AppState>, caller: AuthUser) -> Result<Response> {
    let filter = EventFilter {
        created_by: Some(caller.id),
        ..Default::default()
    };
    let events = state.store.list_events(&filter).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let event = load_visible_event(&state, caller.as_ref(), id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(request): AppJson<EventRequest>,
) -> Result<Response> {
    request.check()?;
    ensure_venue_usable(&state, request.venue_id).await?;

    let event = state
        .store
        .create_event(request.into_event(caller.id, Utc::now()))
        .await?;
    tracing::info!(event_id = %event.id, created_by = %caller.id, "Event created");
    record_audit(
        &state,
        AuditLog::new("Event", event.id, AuditAction::Create, Some(caller.id)),
    )
    .await;
    Ok(created(event, "Event created"))
}

pub async fn update_event(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<EventRequest>,
) -> Result<Response> {
    let existing = load_event(&state, id).await?;
    ensure_event_manager(&caller, &existing)?;
    request.check()?;
    if request.venue_id != existing.venue_id {
        ensure_venue_usable(&state, request.venue_id).await?;
    }

    let event = state.store.update_event(id, request, Utc::now()).await?;
    tracing::info!(event_id = %event.id, "Event updated");
    record_audit(
        &state,
        AuditLog::new("Event", event.id, AuditAction::Update, Some(caller.id)),
    )
    .await;
    if event.status == EventStatus::Cancelled && existing.status != EventStatus::Cancelled {
        notify_cancellation(&state, &event).await?;
    }
    Ok(success(event, "Event updated"))
}

pub async fn update_event_status(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<EventStatusRequest>,
) -> Result<Response> {
    let existing = load_event(&state, id).await?;
    ensure_event_manager(&caller, &existing)?;

    let event = state
        .store
        .set_event_status(id, request.status, Utc::now())
        .await?;
    tracing::info!(
        event_id = %event.id,
        from = ?existing.status,
        to = ?event.status,
        "Event status changed"
    );
    record_audit(
        &state,
        AuditLog::new("Event", event.id, AuditAction::StatusChange, Some(caller.id))
            .with_details(format!("{:?} -> {:?}", existing.status, event.status)),
    )
    .await;
    if event.status == EventStatus::Cancelled && existing.status != EventStatus::Cancelled {
        notify_cancellation(&state, &event).await?;
    }
    Ok(success(event, "Event status updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let event = load_event(&state, id).await?;
    ensure_event_manager(&caller, &event)?;

    if !state.store.delete_event(id).await? {
        return Err(AppError::not_found("Event", id));
    }
    tracing::info!(event_id = %id, "Event deleted");
    record_audit(
        &state,
        AuditLog::new("Event", id, AuditAction::Delete, Some(caller.id)).with_details(event.title),
    )
    .await;
    Ok(no_content())
}

pub async fn event_bookings(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let event = load_event(&state, id).await?;
    ensure_event_manager(&caller, &event)?;
    let filter = BookingFilter {
        event_id: Some(id),
        ..Default::default()
    };
    let bookings = state.store.list_bookings(&filter).await?;
    Ok(success(bookings, "Bookings retrieved"))
}

pub async fn event_attendees(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let event = load_event(&state, id).await?;
    ensure_event_manager(&caller, &event)?;
    let attendees = state.store.list_attendees(Some(id), None).await?;
    Ok(success(attendees, "Attendees retrieved"))
}

pub async fn event_menus(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    load_event(&state, id).await?;
    let query = MenuQuery {
        event_id: Some(id),
        available_only: false,
    };
    let menus = state.store.list_menus(&query).await?;
    Ok(success(menus, "Menus retrieved"))
}
