//! Business rules for bookings and registrations.
//!
//! Everything in here is pure: functions take the loaded entities, check the
//! rules and mutate the values in place. Stores call them while holding
//! whatever lock or transaction makes the read-check-write atomic, then
//! persist the mutated values.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{AttendeeStatus, Event, EventStatus};

pub mod booking;
pub mod registration;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("Event is {0:?} and no longer accepts attendees")]
    EventClosed(EventStatus),

    #[error("Not enough seats: requested {requested}, available {available}")]
    CapacityExceeded { requested: i32, available: i32 },

    #[error("You already have an active booking for this event")]
    DuplicateBooking,

    #[error("Booking has been cancelled")]
    BookingCancelled,

    #[error("Amount is outside the supported range")]
    AmountOutOfRange,

    #[error("Payment exceeds the outstanding amount of {outstanding}")]
    PaymentExceedsTotal { outstanding: Decimal },

    #[error("Booking must be confirmed before check-in")]
    NotConfirmed,

    #[error("Already checked in")]
    AlreadyCheckedIn,

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("A checked-in booking cannot be cancelled")]
    CancelAfterCheckIn,

    #[error("You are already registered for this event")]
    AlreadyRegistered,

    #[error("Event is full")]
    EventFull,

    #[error("Registration is {0:?}, action not allowed")]
    InvalidRegistrationState(AttendeeStatus),

    #[error("This registration does not require a payment")]
    PaymentNotRequired,
}

/// Gives `count` seats back, never taking the counter below zero.
pub fn release_seats(event: &mut Event, count: i32) {
    event.current_attendees -= count.clamp(0, event.current_attendees);
}

fn ensure_open(event: &Event) -> Result<(), LifecycleError> {
    if event.status.accepts_attendees() {
        Ok(())
    } else {
        Err(LifecycleError::EventClosed(event.status))
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::models::{Event, EventStatus};

    pub fn event(max: i32, current: i32, price: i64, is_free: bool) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: "RustConf".to_string(),
            description: None,
            start_date: now + Duration::days(30),
            end_date: now + Duration::days(31),
            location: "Lisbon".to_string(),
            venue_id: None,
            created_by: Uuid::new_v4(),
            max_attendees: max,
            current_attendees: current,
            category: "conference".to_string(),
            status: EventStatus::Published,
            ticket_price: Decimal::from(price),
            is_free,
            is_public: true,
            is_featured: false,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }
}
