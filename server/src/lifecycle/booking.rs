use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{ensure_open, release_seats, LifecycleError};
use crate::models::booking::{CreateBookingRequest, PaymentRequest};
use crate::models::money::max_booking_amount;
use crate::models::{Booking, BookingStatus, Event};

/// `BK` + booking date + six random digits. Uniqueness rests on the random
/// space; the store's unique index reports the rare collision.
pub fn generate_reference(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("BK{}{:06}", now.format("%Y%m%d"), suffix)
}

/// Reserves seats on `event` and builds the new booking.
///
/// `event` is only touched once every check has passed, so a rejected
/// request leaves the counter as it was.
pub fn open(
    event: &mut Event,
    user_id: Uuid,
    request: &CreateBookingRequest,
    has_active_booking: bool,
    now: DateTime<Utc>,
) -> Result<Booking, LifecycleError> {
    ensure_open(event)?;

    let requested = request.number_of_tickets;
    if event.current_attendees + requested > event.max_attendees {
        return Err(LifecycleError::CapacityExceeded {
            requested,
            available: event.seats_left(),
        });
    }
    if has_active_booking {
        return Err(LifecycleError::DuplicateBooking);
    }

    let total_amount = event
        .effective_price()
        .checked_mul(Decimal::from(requested))
        .filter(|total| *total <= max_booking_amount())
        .ok_or(LifecycleError::AmountOutOfRange)?;
    let status = if event.is_free {
        BookingStatus::Confirmed
    } else {
        BookingStatus::Pending
    };

    event.current_attendees += requested;
    event.updated_at = now;

    Ok(Booking {
        id: Uuid::new_v4(),
        event_id: event.id,
        user_id,
        booking_reference: generate_reference(now),
        status,
        number_of_tickets: requested,
        total_amount,
        amount_paid: Decimal::ZERO,
        payment_method: None,
        transaction_id: None,
        special_requests: request.special_requests.clone(),
        is_checked_in: false,
        checked_in_at: None,
        is_approved_by_admin: false,
        approved_at: None,
        cancellation_reason: None,
        cancelled_at: None,
        booked_at: now,
        updated_at: now,
    })
}

/// Accrues a payment. The booking becomes confirmed once fully paid.
pub fn apply_payment(
    booking: &mut Booking,
    payment: &PaymentRequest,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if booking.status == BookingStatus::Cancelled {
        return Err(LifecycleError::BookingCancelled);
    }
    let paid = booking
        .amount_paid
        .checked_add(payment.amount)
        .ok_or(LifecycleError::AmountOutOfRange)?;
    if paid > booking.total_amount {
        return Err(LifecycleError::PaymentExceedsTotal {
            outstanding: booking.outstanding(),
        });
    }

    booking.amount_paid = paid;
    booking.payment_method = Some(payment.payment_method.clone());
    if payment.transaction_id.is_some() {
        booking.transaction_id = payment.transaction_id.clone();
    }
    if booking.amount_paid >= booking.total_amount {
        booking.status = BookingStatus::Confirmed;
    }
    booking.updated_at = now;
    Ok(())
}

pub fn check_in(booking: &mut Booking, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    if booking.status != BookingStatus::Confirmed {
        return Err(LifecycleError::NotConfirmed);
    }
    if booking.is_checked_in {
        return Err(LifecycleError::AlreadyCheckedIn);
    }
    booking.is_checked_in = true;
    booking.checked_in_at = Some(now);
    booking.updated_at = now;
    Ok(())
}

/// Cancels the booking and hands its seats back to the event.
pub fn cancel(
    booking: &mut Booking,
    event: &mut Event,
    reason: Option<String>,
    now: DateTime<Utc>,
) -> Result<(), LifecycleError> {
    if booking.status == BookingStatus::Cancelled {
        return Err(LifecycleError::AlreadyCancelled);
    }
    if booking.is_checked_in {
        return Err(LifecycleError::CancelAfterCheckIn);
    }

    booking.status = BookingStatus::Cancelled;
    booking.cancelled_at = Some(now);
    booking.cancellation_reason = reason;
    booking.updated_at = now;

    release_seats(event, booking.number_of_tickets);
    event.updated_at = now;
    Ok(())
}

pub fn approve(booking: &mut Booking, now: DateTime<Utc>) -> Result<(), LifecycleError> {
    if booking.status == BookingStatus::Cancelled {
        return Err(LifecycleError::BookingCancelled);
    }
    if !booking.is_approved_by_admin {
        booking.is_approved_by_admin = true;
        booking.approved_at = Some(now);
        booking.updated_at = now;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::fixtures;
    use crate::models::EventStatus;

    fn request(event_id: Uuid, tickets: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            event_id,
            number_of_tickets: tickets,
            special_requests: None,
        }
    }

    fn book(event: &mut Event, tickets: i32) -> Result<Booking, LifecycleError> {
        let req = request(event.id, tickets);
        open(event, Uuid::new_v4(), &req, false, Utc::now())
    }

    fn payment(amount: i64) -> PaymentRequest {
        PaymentRequest {
            amount: Decimal::from(amount),
            payment_method: "card".to_string(),
            transaction_id: Some(format!("tx-{}", amount)),
        }
    }

    #[test]
    fn test_reference_format() {
        let now = Utc::now();
        let reference = generate_reference(now);
        assert_eq!(reference.len(), 2 + 8 + 6);
        assert!(reference.starts_with(&format!("BK{}", now.format("%Y%m%d"))));
        assert!(reference[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_capacity_scenario() {
        let mut event = fixtures::event(10, 9, 0, true);
        let user = Uuid::new_v4();

        let two = request(event.id, 2);
        let err = open(&mut event, user, &two, false, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::CapacityExceeded {
                requested: 2,
                available: 1
            }
        );
        assert_eq!(event.current_attendees, 9);

        let one = request(event.id, 1);
        let booking = open(&mut event, user, &one, false, Utc::now()).unwrap();
        assert_eq!(event.current_attendees, 10);
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_free_event_booking_is_confirmed_without_payment() {
        let mut event = fixtures::event(100, 0, 25, true);
        let booking = book(&mut event, 3).unwrap();
        assert_eq!(booking.total_amount, Decimal::ZERO);
        assert_eq!(booking.amount_paid, Decimal::ZERO);
        assert_eq!(booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_duplicate_booking_is_rejected_without_taking_seats() {
        let mut event = fixtures::event(100, 4, 10, false);
        let req = request(event.id, 1);
        let err = open(&mut event, Uuid::new_v4(), &req, true, Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::DuplicateBooking);
        assert_eq!(event.current_attendees, 4);
    }

    #[test]
    fn test_closed_event_rejects_bookings() {
        let mut event = fixtures::event(100, 0, 10, false);
        event.status = EventStatus::Cancelled;
        let err = book(&mut event, 1).unwrap_err();
        assert_eq!(err, LifecycleError::EventClosed(EventStatus::Cancelled));
    }

    #[test]
    fn test_paid_booking_confirms_once_fully_paid() {
        let mut event = fixtures::event(100, 0, 50, false);
        let mut booking = book(&mut event, 2).unwrap();
        assert_eq!(booking.total_amount, Decimal::from(100));
        assert_eq!(booking.status, BookingStatus::Pending);

        apply_payment(&mut booking, &payment(40), Utc::now()).unwrap();
        assert_eq!(booking.amount_paid, Decimal::from(40));
        assert_eq!(booking.status, BookingStatus::Pending);

        let err = apply_payment(&mut booking, &payment(61), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::PaymentExceedsTotal {
                outstanding: Decimal::from(60)
            }
        );
        assert_eq!(booking.amount_paid, Decimal::from(40));

        apply_payment(&mut booking, &payment(60), Utc::now()).unwrap();
        assert_eq!(booking.amount_paid, Decimal::from(100));
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.transaction_id.as_deref(), Some("tx-60"));
    }

    #[test]
    fn test_payment_on_cancelled_booking_is_rejected() {
        let mut event = fixtures::event(100, 0, 50, false);
        let mut booking = book(&mut event, 1).unwrap();
        cancel(&mut booking, &mut event, None, Utc::now()).unwrap();
        let err = apply_payment(&mut booking, &payment(10), Utc::now()).unwrap_err();
        assert_eq!(err, LifecycleError::BookingCancelled);
    }

    #[test]
    fn test_check_in_requires_confirmation_and_happens_once() {
        let mut event = fixtures::event(100, 0, 50, false);
        let mut booking = book(&mut event, 1).unwrap();
        assert_eq!(
            check_in(&mut booking, Utc::now()).unwrap_err(),
            LifecycleError::NotConfirmed
        );

        apply_payment(&mut booking, &payment(50), Utc::now()).unwrap();
        check_in(&mut booking, Utc::now()).unwrap();
        assert!(booking.is_checked_in);
        assert!(booking.checked_in_at.is_some());
        assert_eq!(
            check_in(&mut booking, Utc::now()).unwrap_err(),
            LifecycleError::AlreadyCheckedIn
        );
    }

    #[test]
    fn test_cancel_releases_seats_and_rejects_checked_in() {
        let mut event = fixtures::event(10, 0, 0, true);
        let mut booking = book(&mut event, 4).unwrap();
        assert_eq!(event.current_attendees, 4);

        cancel(&mut booking, &mut event, Some("sick".into()), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.cancellation_reason.as_deref(), Some("sick"));
        assert!(booking.cancelled_at.is_some());
        assert_eq!(event.current_attendees, 0);

        assert_eq!(
            cancel(&mut booking, &mut event, None, Utc::now()).unwrap_err(),
            LifecycleError::AlreadyCancelled
        );

        let mut checked_in = book(&mut event, 2).unwrap();
        check_in(&mut checked_in, Utc::now()).unwrap();
        assert_eq!(
            cancel(&mut checked_in, &mut event, None, Utc::now()).unwrap_err(),
            LifecycleError::CancelAfterCheckIn
        );
        assert_eq!(event.current_attendees, 2);
    }

    #[test]
    fn test_counter_matches_active_bookings_after_mixed_operations() {
        let mut event = fixtures::event(50, 0, 0, true);
        let mut bookings = Vec::new();
        for tickets in [3, 5, 1, 7] {
            bookings.push(book(&mut event, tickets).unwrap());
        }
        cancel(&mut bookings[1], &mut event, None, Utc::now()).unwrap();
        cancel(&mut bookings[3], &mut event, None, Utc::now()).unwrap();

        let active: i32 = bookings
            .iter()
            .filter(|b| b.is_active())
            .map(|b| b.number_of_tickets)
            .sum();
        assert_eq!(event.current_attendees, active);
        assert_eq!(active, 4);
    }

    #[test]
    fn test_approve_is_idempotent_and_rejects_cancelled() {
        let mut event = fixtures::event(10, 0, 0, true);
        let mut booking = book(&mut event, 1).unwrap();
        approve(&mut booking, Utc::now()).unwrap();
        let approved_at = booking.approved_at;
        approve(&mut booking, Utc::now()).unwrap();
        assert!(booking.is_approved_by_admin);
        assert_eq!(booking.approved_at, approved_at);

        cancel(&mut booking, &mut event, None, Utc::now()).unwrap();
        assert_eq!(
            approve(&mut booking, Utc::now()).unwrap_err(),
            LifecycleError::BookingCancelled
        );
    }

    #[test]
    fn test_maximum_price_books_without_overflow() {
        let mut event = fixtures::event(10, 0, 0, false);
        event.ticket_price = crate::models::money::max_price();
        let booking = book(&mut event, 2).unwrap();
        assert_eq!(booking.total_amount, Decimal::new(1_999_999_999_998, 2));
        assert_eq!(event.current_attendees, 2);
    }

    #[test]
    fn test_unrepresentable_total_is_rejected_without_taking_seats() {
        let mut event = fixtures::event(10, 0, 0, false);
        event.ticket_price = Decimal::MAX;
        assert_eq!(book(&mut event, 2).unwrap_err(), LifecycleError::AmountOutOfRange);
        assert_eq!(event.current_attendees, 0);
    }
}
