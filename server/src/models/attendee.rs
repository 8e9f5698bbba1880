use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "attendee_status", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum AttendeeStatus {
    Registered,
    CheckedIn,
    Cancelled,
    NoShow,
}

/// RSVP-style registration, separate from a ticketed `Booking`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub status: AttendeeStatus,
    pub payment_required: bool,
    pub payment_completed: bool,
    pub notes: Option<String>,
    pub registered_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl EventAttendee {
    pub fn holds_seat(&self) -> bool {
        self.status != AttendeeStatus::Cancelled
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAttendeeRequest {
    pub event_id: Uuid,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}
