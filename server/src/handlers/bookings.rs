use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use super::{load_event, load_visible_event, notify, record_audit};
use crate::auth::{AdminUser, AuthUser};
use crate::models::booking::{
    BookingFilter, BookingQuery, CancelBookingRequest, CreateBookingRequest, PaymentRequest,
};
use crate::models::{
    AuditAction, AuditLog, Booking, BookingStatus, Notification, NotificationType,
};
use crate::state::AppState;
use crate::store::BookingRepo;
use crate::utils::error::{AppError, Result};
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::response::{created, success};

async fn load_booking(state: &AppState, id: Uuid) -> Result<Booking> {
    state
        .store
        .get_booking(id)
        .await?
        .ok_or_else(|| AppError::not_found("Booking", id))
}

fn ensure_holder(caller: &AuthUser, booking: &Booking) -> Result<()> {
    caller.ensure_can_manage(booking.user_id)
}

/// Holder, admin, or the creator of the booked event.
async fn ensure_viewer(state: &AppState, caller: &AuthUser, booking: &Booking) -> Result<()> {
    if ensure_holder(caller, booking).is_ok() {
        return Ok(());
    }
    let event = load_event(state, booking.event_id).await?;
    caller.ensure_can_manage(event.created_by)
}

pub async fn create_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(request): AppJson<CreateBookingRequest>,
) -> Result<Response> {
    request.validate()?;
    load_visible_event(&state, Some(&caller), request.event_id).await?;
    let booking = state
        .store
        .create_booking(caller.id, &request, Utc::now())
        .await?;
    tracing::info!(
        booking_id = %booking.id,
        event_id = %booking.event_id,
        tickets = booking.number_of_tickets,
        reference = %booking.booking_reference,
        "Booking created"
    );

    record_audit(
        &state,
        AuditLog::new("Booking", booking.id, AuditAction::Create, Some(caller.id))
            .with_details(booking.booking_reference.clone()),
    )
    .await;
    let (kind, message) = if booking.status == BookingStatus::Confirmed {
        (
            NotificationType::BookingConfirmed,
            format!("Booking {} is confirmed.", booking.booking_reference),
        )
    } else {
        (
            NotificationType::BookingCreated,
            format!(
                "Booking {} is awaiting payment of {}.",
                booking.booking_reference, booking.total_amount
            ),
        )
    };
    notify(
        &state,
        Notification::new(caller.id, kind, "Booking received", message)
            .for_event(booking.event_id)
            .for_booking(booking.id),
    )
    .await;

    Ok(created(booking, "Booking created"))
}

pub async fn list_bookings(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<BookingQuery>,
) -> Result<Response> {
    let filter = BookingFilter {
        event_id: query.event_id,
        status: query.status,
        user_id: None,
    };
    let bookings = state.store.list_bookings(&filter).await?;
    Ok(success(bookings, "Bookings retrieved"))
}

pub async fn my_bookings(State(state): State<AppState>, caller: AuthUser) -> Result<Response> {
    let filter = BookingFilter {
        user_id: Some(caller.id),
        ..Default::default()
    };
    let bookings = state.store.list_bookings(&filter).await?;
    Ok(success(bookings, "Bookings retrieved"))
}

pub async fn get_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let booking = load_booking(&state, id).await?;
    ensure_viewer(&state, &caller, &booking).await?;
    Ok(success(booking, "Booking retrieved"))
}

pub async fn get_booking_by_reference(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(reference): AppPath<String>,
) -> Result<Response> {
    let booking = state
        .store
        .get_booking_by_reference(&reference)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Booking '{}' was not found", reference)))?;
    ensure_viewer(&state, &caller, &booking).await?;
    Ok(success(booking, "Booking retrieved"))
}

pub async fn pay_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payment): AppJson<PaymentRequest>,
) -> Result<Response> {
    payment.check()?;
    let existing = load_booking(&state, id).await?;
    ensure_holder(&caller, &existing)?;

    let booking = state.store.pay_booking(id, &payment, Utc::now()).await?;
    tracing::info!(
        booking_id = %booking.id,
        amount = %payment.amount,
        paid = %booking.amount_paid,
        total = %booking.total_amount,
        "Payment recorded"
    );
    record_audit(
        &state,
        AuditLog::new("Booking", booking.id, AuditAction::Update, Some(caller.id))
            .with_details(format!("payment {} via {}", payment.amount, payment.payment_method)),
    )
    .await;

    notify(
        &state,
        Notification::new(
            booking.user_id,
            NotificationType::PaymentReceived,
            "Payment received",
            format!(
                "We received {} for booking {}. Outstanding: {}.",
                payment.amount,
                booking.booking_reference,
                booking.outstanding()
            ),
        )
        .for_event(booking.event_id)
        .for_booking(booking.id),
    )
    .await;
    if existing.status != BookingStatus::Confirmed && booking.status == BookingStatus::Confirmed {
        notify(
            &state,
            Notification::new(
                booking.user_id,
                NotificationType::BookingConfirmed,
                "Booking confirmed",
                format!("Booking {} is fully paid and confirmed.", booking.booking_reference),
            )
            .for_event(booking.event_id)
            .for_booking(booking.id),
        )
        .await;
    }

    Ok(success(booking, "Payment recorded"))
}

pub async fn check_in_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let existing = load_booking(&state, id).await?;
    let event = load_event(&state, existing.event_id).await?;
    caller.ensure_can_manage(event.created_by)?;

    let booking = state.store.check_in_booking(id, Utc::now()).await?;
    tracing::info!(booking_id = %booking.id, "Booking checked in");
    record_audit(
        &state,
        AuditLog::new("Booking", booking.id, AuditAction::StatusChange, Some(caller.id))
            .with_details("checked in"),
    )
    .await;
    Ok(success(booking, "Booking checked in"))
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
    body: Option<AppJson<CancelBookingRequest>>,
) -> Result<Response> {
    let request = body.map(|AppJson(request)| request).unwrap_or_default();
    request.validate()?;
    let existing = load_booking(&state, id).await?;
    ensure_holder(&caller, &existing)?;

    let booking = state
        .store
        .cancel_booking(id, request.reason, Utc::now())
        .await?;
    tracing::info!(
        booking_id = %booking.id,
        released = booking.number_of_tickets,
        "Booking cancelled"
    );
    record_audit(
        &state,
        AuditLog::new("Booking", booking.id, AuditAction::StatusChange, Some(caller.id))
            .with_details("cancelled"),
    )
    .await;
    notify(
        &state,
        Notification::new(
            booking.user_id,
            NotificationType::BookingCancelled,
            "Booking cancelled",
            format!("Booking {} has been cancelled.", booking.booking_reference),
        )
        .for_event(booking.event_id)
        .for_booking(booking.id),
    )
    .await;
    Ok(success(booking, "Booking cancelled"))
}

pub async fn approve_booking(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let booking = state.store.approve_booking(id, Utc::now()).await?;
    tracing::info!(booking_id = %booking.id, "Booking approved");
    record_audit(
        &state,
        AuditLog::new("Booking", booking.id, AuditAction::StatusChange, Some(admin.id))
            .with_details("approved"),
    )
    .await;
    Ok(success(booking, "Booking approved"))
}
