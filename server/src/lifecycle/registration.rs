use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ensure_open, release_seats, LifecycleError};
use crate::models::{AttendeeStatus, Event, EventAttendee};

/// Registers `user_id` for `event`, taking one seat.
///
/// There is at most one registration row per (event, user). A cancelled row
/// is reactivated in place (same id); any other existing row is a rejection.
pub fn register(
    event: &mut Event,
    existing: Option<&EventAttendee>,
    user_id: Uuid,
    notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<EventAttendee, LifecycleError> {
    if let Some(existing) = existing {
        if existing.holds_seat() {
            return Err(LifecycleError::AlreadyRegistered);
        }
    }
    ensure_open(event)?;
    if event.current_attendees >= event.max_attendees {
        return Err(LifecycleError::EventFull);
    }

    event.current_attendees += 1;
    event.updated_at = now;

    let attendee = match existing {
        Some(previous) => EventAttendee {
            status: AttendeeStatus::Registered,
            payment_required: !event.is_free,
            payment_completed: previous.payment_completed && !event.is_free,
            notes: notes.or_else(|| previous.notes.clone()),
            registered_at: now,
            checked_in_at: None,
            cancelled_at: None,
            updated_at: now,
            ..previous.clone()
        },
        None => EventAttendee {
            id: Uuid::new_v4(),
            event_id: event.id,
            user_id,
            status: AttendeeStatus::Registered,
            payment_required: !event.is_free,
            payment_completed: false,
            notes,
            registered_at: now,
            checked_in_at: None,
            cancelled_at: None,
            updated_at: now,
        },
    };
    Ok(attendee)
}

pub fn check_in(attendee: &mut EventAttendee, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    match attendee.status {
        AttendeeStatus::Registered => {
            attendee.status = AttendeeStatus::CheckedIn;
            attendee.checked_in_at = Some(now);
            attendee.updated_at = now;
            Ok(())
        }
        AttendeeStatus::CheckedIn => Err(LifecycleError::AlreadyCheckedIn),
        other => Err(LifecycleError::InvalidRegistrationState(other)),
    }
}

/// Cancels the registration and frees its seat.
pub fn cancel(
    attendee: &mut EventAttendee,
    event: &mut Event,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    match attendee.status {
        AttendeeStatus::Cancelled => return Err(LifecycleError::AlreadyCancelled),
        AttendeeStatus::CheckedIn => return Err(LifecycleError::CancelAfterCheckIn),
        AttendeeStatus::Registered | AttendeeStatus::NoShow => {}
    }
    attendee.status = AttendeeStatus::Cancelled;
    attendee.cancelled_at = Some(now);
    attendee.updated_at = now;

    release_seats(event, 1);
    event.updated_at = now;
    Ok(())
}

pub fn mark_no_show(attendee: &mut EventAttendee, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    if attendee.status != AttendeeStatus::Registered {
        return Err(LifecycleError::InvalidRegistrationState(attendee.status));
    }
    attendee.status = AttendeeStatus::NoShow;
    attendee.updated_at = now;
    Ok(())
}

pub fn complete_payment(
    attendee: &mut EventAttendee,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if attendee.status == AttendeeStatus::Cancelled {
        return Err(LifecycleError::InvalidRegistrationState(attendee.status));
    }
    if !attendee.payment_required {
        return Err(LifecycleError::PaymentNotRequired);
    }
    attendee.payment_completed = true;
    attendee.updated_at = now;
    Ok(())
}
