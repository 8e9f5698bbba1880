//! Persistence seams.
//!
//! Each repository owns one entity. Related entities are referenced by id and
//! resolved through explicit lookups, never through embedded object graphs.
//! Operations that check a rule and then write (seat accounting, payments,
//! status transitions) are single repository calls so that every backend can
//! run them atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::audit_log::AuditQuery;
use crate::models::booking::{BookingFilter, CreateBookingRequest, PaymentRequest};
use crate::models::event::{EventFilter, EventRequest};
use crate::models::menu::{MenuQuery, MenuRequest};
use crate::models::venue::{VenueRemoval, VenueRequest};
use crate::models::{
    AuditLog, Booking, Event, EventAttendee, EventStatus, Menu, Notification, RefreshToken, User,
    Venue,
};
use crate::utils::error::Result;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait EventRepo: Send + Sync {
    async fn create_event(&self, event: Event) -> Result<Event>;
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>>;
    /// Ordered by start date.
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>>;
    /// Applies the request under a row lock. `NotFound` if the event vanished meanwhile.
    async fn update_event(
        &self,
        id: Uuid,
        request: EventRequest,
        now: DateTime<Utc>,
    ) -> Result<Event>;
    async fn set_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<Event>;
    /// Cascades to bookings and registrations; assigned menus become catalog items.
    async fn delete_event(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait VenueRepo: Send + Sync {
    async fn create_venue(&self, venue: Venue) -> Result<Venue>;
    async fn get_venue(&self, id: Uuid) -> Result<Option<Venue>>;
    async fn list_venues(&self, include_inactive: bool) -> Result<Vec<Venue>>;
    async fn search_venues(&self, text: &str) -> Result<Vec<Venue>>;
    async fn update_venue(
        &self,
        id: Uuid,
        request: VenueRequest,
        now: DateTime<Utc>,
    ) -> Result<Venue>;
    /// Deactivates the venue when events still reference it, deletes it otherwise.
    async fn remove_venue(&self, id: Uuid, now: DateTime<Utc>) -> Result<VenueRemoval>;
}

#[async_trait]
pub trait MenuRepo: Send + Sync {
    async fn create_menu(&self, menu: Menu) -> Result<Menu>;
    async fn get_menu(&self, id: Uuid) -> Result<Option<Menu>>;
    async fn list_menus(&self, query: &MenuQuery) -> Result<Vec<Menu>>;
    async fn update_menu(&self, id: Uuid, request: MenuRequest, now: DateTime<Utc>)
        -> Result<Menu>;
    async fn assign_menu(
        &self,
        id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Menu>;
    async fn delete_menu(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait BookingRepo: Send + Sync {
    /// Capacity check, duplicate check, seat reservation and insert as one unit.
    async fn create_booking(
        &self,
        user_id: Uuid,
        request: &CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking>;
    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>>;
    async fn get_booking_by_reference(&self, reference: &str) -> Result<Option<Booking>>;
    /// Newest first.
    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>>;
    async fn pay_booking(
        &self,
        id: Uuid,
        payment: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking>;
    async fn check_in_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking>;
    /// Cancels and releases the booking's seats on its event.
    async fn cancel_booking(
        &self,
        id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Booking>;
    async fn approve_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking>;
}

#[async_trait]
pub trait AttendeeRepo: Send + Sync {
    async fn register_attendee(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee>;
    async fn get_attendee(&self, id: Uuid) -> Result<Option<EventAttendee>>;
    async fn list_attendees(
        &self,
        event_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> Result<Vec<EventAttendee>>;
    async fn check_in_attendee(&self, id: Uuid, now: DateTime<Utc>) -> Result<EventAttendee>;
    async fn cancel_attendee(&self, id: Uuid, now: DateTime<Utc>) -> Result<EventAttendee>;
    async fn mark_attendee_no_show(&self, id: Uuid, now: DateTime<Utc>)
        -> Result<EventAttendee>;
    async fn complete_attendee_payment(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee>;
}

#[async_trait]
pub trait NotificationRepo: Send + Sync {
    async fn create_notification(&self, notification: Notification) -> Result<Notification>;
    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>>;
    /// Newest first.
    async fn list_notifications(&self, user_id: Uuid, unread_only: bool)
        -> Result<Vec<Notification>>;
    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64>;
    async fn mark_notification_read(&self, id: Uuid, now: DateTime<Utc>) -> Result<Notification>;
    async fn mark_all_notifications_read(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64>;
    async fn delete_notification(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait UserRepo: Send + Sync {
    /// `Conflict` when the email or username is taken.
    async fn create_user(&self, user: User) -> Result<User>;
    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    /// Looks up by email (case-insensitive) or username.
    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    async fn update_user(&self, user: &User) -> Result<User>;
    /// `Conflict` while the user still owns events.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn create_refresh_token(&self, token: RefreshToken) -> Result<RefreshToken>;
    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>>;
    /// Revokes `presented` in favour of `replacement`. Fails with `AuthError` if
    /// `presented` is no longer active, which makes every token single use.
    async fn rotate_refresh_token(
        &self,
        presented: &str,
        replacement: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken>;
    async fn revoke_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<bool>;
    async fn revoke_user_refresh_tokens(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_audit(&self, entry: AuditLog) -> Result<()>;
    /// Newest first.
    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLog>>;
}

pub trait Store:
    EventRepo
    + VenueRepo
    + MenuRepo
    + BookingRepo
    + AttendeeRepo
    + NotificationRepo
    + UserRepo
    + RefreshTokenRepo
    + AuditRepo
{
}

impl<T> Store for T where
    T: EventRepo
        + VenueRepo
        + MenuRepo
        + BookingRepo
        + AttendeeRepo
        + NotificationRepo
        + UserRepo
        + RefreshTokenRepo
        + AuditRepo
{
}
