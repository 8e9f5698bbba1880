use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::money::check_payment_amount;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Refunded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub booking_reference: String,
    pub status: BookingStatus,
    pub number_of_tickets: i32,
    pub total_amount: Decimal,
    pub amount_paid: Decimal,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub special_requests: Option<String>,
    pub is_checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub is_approved_by_admin: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub booked_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Non-cancelled bookings hold seats and block a second booking for the same event.
    pub fn is_active(&self) -> bool {
        self.status != BookingStatus::Cancelled
    }

    pub fn outstanding(&self) -> Decimal {
        self.total_amount - self.amount_paid
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
    #[validate(range(min = 1, max = 100))]
    pub number_of_tickets: i32,
    #[validate(length(max = 500))]
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, max = 50))]
    pub payment_method: String,
    #[validate(length(max = 200))]
    pub transaction_id: Option<String>,
}

impl PaymentRequest {
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        check_payment_amount("amount", self.amount)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingQuery {
    pub event_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub event_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        self.event_id.map_or(true, |id| booking.event_id == id)
            && self.user_id.map_or(true, |id| booking.user_id == id)
            && self.status.map_or(true, |s| booking.status == s)
    }
}
