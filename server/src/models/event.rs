use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::money::check_price;
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "camelCase")]
pub enum EventStatus {
    Draft,
    Published,
    InProgress,
    Completed,
    Cancelled,
    Postponed,
}

impl EventStatus {
    /// Whether new bookings and registrations are still accepted.
    pub fn accepts_attendees(self) -> bool {
        !matches!(self, EventStatus::Cancelled | EventStatus::Completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub location: String,
    pub venue_id: Option<Uuid>,
    pub created_by: Uuid,
    pub max_attendees: i32,
    pub current_attendees: i32,
    pub category: String,
    pub status: EventStatus,
    pub ticket_price: Decimal,
    pub is_free: bool,
    pub is_public: bool,
    pub is_featured: bool,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn seats_left(&self) -> i32 {
        (self.max_attendees - self.current_attendees).max(0)
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.created_by == user_id
    }

    /// Price charged per ticket, zero for free events regardless of the stored price.
    pub fn effective_price(&self) -> Decimal {
        if self.is_free {
            Decimal::ZERO
        } else {
            self.ticket_price
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 4000))]
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[validate(length(min = 1, max = 300))]
    pub location: String,
    pub venue_id: Option<Uuid>,
    #[validate(range(min = 1, max = 1_000_000))]
    pub max_attendees: i32,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    pub status: Option<EventStatus>,
    #[serde(default)]
    pub ticket_price: Decimal,
    #[serde(default)]
    pub is_free: bool,
    #[serde(default = "default_true")]
    pub is_public: bool,
    #[serde(default)]
    pub is_featured: bool,
    #[validate(length(max = 1000))]
    pub image_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl EventRequest {
    /// Field-shape validation plus the cross-field rules the derive cannot express.
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.end_date < self.start_date {
            return Err(AppError::ValidationError(
                "endDate must not be before startDate".to_string(),
            ));
        }
        check_price("ticketPrice", self.ticket_price)
    }

    pub fn stored_price(&self) -> Decimal {
        if self.is_free {
            Decimal::ZERO
        } else {
            self.ticket_price
        }
    }

    pub fn into_event(self, created_by: Uuid, now: DateTime<Utc>) -> Event {
        let ticket_price = self.stored_price();
        Event {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            start_date: self.start_date,
            end_date: self.end_date,
            location: self.location,
            venue_id: self.venue_id,
            created_by,
            max_attendees: self.max_attendees,
            current_attendees: 0,
            category: self.category,
            status: self.status.unwrap_or(EventStatus::Draft),
            ticket_price,
            is_free: self.is_free,
            is_public: self.is_public,
            is_featured: self.is_featured,
            image_url: self.image_url,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies the request onto an existing event, keeping identity and the attendee counter.
    pub fn apply_to(self, event: &mut Event, now: DateTime<Utc>) -> Result<()> {
        if self.max_attendees < event.current_attendees {
            return Err(AppError::BusinessRule(format!(
                "maxAttendees cannot be lower than the {} seats already taken",
                event.current_attendees
            )));
        }
        event.ticket_price = self.stored_price();
        event.title = self.title;
        event.description = self.description;
        event.start_date = self.start_date;
        event.end_date = self.end_date;
        event.location = self.location;
        event.venue_id = self.venue_id;
        event.max_attendees = self.max_attendees;
        event.category = self.category;
        if let Some(status) = self.status {
            event.status = status;
        }
        event.is_free = self.is_free;
        event.is_public = self.is_public;
        event.is_featured = self.is_featured;
        event.image_url = self.image_url;
        event.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventStatusRequest {
    pub status: EventStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventQuery {
    pub status: Option<EventStatus>,
    pub category: Option<String>,
    pub venue_id: Option<Uuid>,
    #[serde(default)]
    pub upcoming: bool,
}

/// Store-level filter. `public_only` and `created_by` are set by handlers, never by clients.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
    pub category: Option<String>,
    pub venue_id: Option<Uuid>,
    pub starts_after: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub public_only: bool,
    pub text: Option<String>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        if self.public_only && !event.is_public {
            return false;
        }
        if let Some(status) = self.status {
            if event.status != status {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !event.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if self.venue_id.is_some() && event.venue_id != self.venue_id {
            return false;
        }
        if let Some(after) = self.starts_after {
            if event.start_date < after {
                return false;
            }
        }
        if let Some(before) = self.starts_before {
            if event.start_date > before {
                return false;
            }
        }
        if let Some(owner) = self.created_by {
            if event.created_by != owner {
                return false;
            }
        }
        if let Some(text) = &self.text {
            let needle = text.to_lowercase();
            let hit = event.title.to_lowercase().contains(&needle)
                || event.location.to_lowercase().contains(&needle)
                || event
                    .description
                    .as_deref()
                    .map(|d| d.to_lowercase().contains(&needle))
                    .unwrap_or(false);
            if !hit {
                return false;
            }
        }
        true
    }
}
