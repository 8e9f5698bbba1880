//! In-memory backend: one table per entity keyed by id, all of them behind a
//! single lock so every repository call is atomic. Used by the test-suite and
//! by `STORAGE_BACKEND=memory` for local runs without Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    AttendeeRepo, AuditRepo, BookingRepo, EventRepo, MenuRepo, NotificationRepo,
    RefreshTokenRepo, UserRepo, VenueRepo,
};
use crate::lifecycle::{booking, registration};
use crate::models::audit_log::AuditQuery;
use crate::models::booking::{BookingFilter, CreateBookingRequest, PaymentRequest};
use crate::models::event::{EventFilter, EventRequest};
use crate::models::menu::{MenuQuery, MenuRequest};
use crate::models::venue::{VenueRemoval, VenueRequest};
use crate::models::{
    AuditLog, Booking, Event, EventAttendee, EventStatus, Menu, Notification, RefreshToken, User,
    Venue,
};
use crate::utils::error::{AppError, Result};

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    venues: HashMap<Uuid, Venue>,
    menus: HashMap<Uuid, Menu>,
    bookings: HashMap<Uuid, Booking>,
    attendees: HashMap<Uuid, EventAttendee>,
    notifications: HashMap<Uuid, Notification>,
    users: HashMap<Uuid, User>,
    refresh_tokens: HashMap<Uuid, RefreshToken>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn event(&self, id: Uuid) -> Result<Event> {
        self.events
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Event", id))
    }

    fn booking(&self, id: Uuid) -> Result<Booking> {
        self.bookings
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Booking", id))
    }

    fn attendee(&self, id: Uuid) -> Result<EventAttendee> {
        self.attendees
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Registration", id))
    }

    /// Mirrors the `REFERENCES events(id)` constraints of the SQL schema.
    fn ensure_event_exists(&self, event_id: Option<Uuid>) -> Result<()> {
        match event_id {
            Some(id) if !self.events.contains_key(&id) => Err(AppError::not_found("Event", id)),
            _ => Ok(()),
        }
    }

    fn ensure_venue_exists(&self, venue_id: Option<Uuid>) -> Result<()> {
        match venue_id {
            Some(id) if !self.venues.contains_key(&id) => Err(AppError::not_found("Venue", id)),
            _ => Ok(()),
        }
    }

    fn user_conflicts(&self, user: &User) -> bool {
        self.users.values().any(|other| {
            other.id != user.id
                && (other.email.eq_ignore_ascii_case(&user.email)
                    || other.username == user.username)
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventRepo for MemoryStore {
    async fn create_event(&self, event: Event) -> Result<Event> {
        let mut tables = self.tables.write().await;
        tables.ensure_venue_exists(event.venue_id)?;
        if !tables.users.contains_key(&event.created_by) {
            return Err(AppError::not_found("User", event.created_by));
        }
        tables.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let tables = self.tables.read().await;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.start_date, e.created_at));
        Ok(events)
    }

    async fn update_event(
        &self,
        id: Uuid,
        request: EventRequest,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        let mut tables = self.tables.write().await;
        tables.ensure_venue_exists(request.venue_id)?;
        let mut event = tables.event(id)?;
        request.apply_to(&mut event, now)?;
        tables.events.insert(id, event.clone());
        Ok(event)
    }

    async fn set_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        let mut tables = self.tables.write().await;
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Event", id))?;
        event.status = status;
        event.updated_at = now;
        Ok(event.clone())
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.events.remove(&id).is_none() {
            return Ok(false);
        }
        tables.bookings.retain(|_, b| b.event_id != id);
        tables.attendees.retain(|_, a| a.event_id != id);
        for menu in tables.menus.values_mut() {
            if menu.event_id == Some(id) {
                menu.event_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl VenueRepo for MemoryStore {
    async fn create_venue(&self, venue: Venue) -> Result<Venue> {
        let mut tables = self.tables.write().await;
        tables.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    async fn get_venue(&self, id: Uuid) -> Result<Option<Venue>> {
        Ok(self.tables.read().await.venues.get(&id).cloned())
    }

    async fn list_venues(&self, include_inactive: bool) -> Result<Vec<Venue>> {
        let tables = self.tables.read().await;
        let mut venues: Vec<Venue> = tables
            .venues
            .values()
            .filter(|v| include_inactive || v.is_active)
            .cloned()
            .collect();
        venues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(venues)
    }

    async fn search_venues(&self, text: &str) -> Result<Vec<Venue>> {
        let tables = self.tables.read().await;
        let mut venues: Vec<Venue> = tables
            .venues
            .values()
            .filter(|v| v.is_active && v.matches_text(text))
            .cloned()
            .collect();
        venues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(venues)
    }

    async fn update_venue(
        &self,
        id: Uuid,
        request: VenueRequest,
        now: DateTime<Utc>,
    ) -> Result<Venue> {
        let mut tables = self.tables.write().await;
        let venue = tables
            .venues
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Venue", id))?;
        request.apply_to(venue, now);
        Ok(venue.clone())
    }

    async fn remove_venue(&self, id: Uuid, now: DateTime<Utc>) -> Result<VenueRemoval> {
        let mut tables = self.tables.write().await;
        let referenced = tables.events.values().any(|e| e.venue_id == Some(id));
        if referenced {
            let venue = tables
                .venues
                .get_mut(&id)
                .ok_or_else(|| AppError::not_found("Venue", id))?;
            venue.is_active = false;
            venue.updated_at = now;
            Ok(VenueRemoval::Deactivated)
        } else {
            tables
                .venues
                .remove(&id)
                .map(|_| VenueRemoval::Deleted)
                .ok_or_else(|| AppError::not_found("Venue", id))
        }
    }
}

#[async_trait]
impl MenuRepo for MemoryStore {
    async fn create_menu(&self, menu: Menu) -> Result<Menu> {
        let mut tables = self.tables.write().await;
        tables.ensure_event_exists(menu.event_id)?;
        tables.menus.insert(menu.id, menu.clone());
        Ok(menu)
    }

    async fn get_menu(&self, id: Uuid) -> Result<Option<Menu>> {
        Ok(self.tables.read().await.menus.get(&id).cloned())
    }

    async fn list_menus(&self, query: &MenuQuery) -> Result<Vec<Menu>> {
        let tables = self.tables.read().await;
        let mut menus: Vec<Menu> = tables
            .menus
            .values()
            .filter(|m| query.event_id.map_or(true, |id| m.event_id == Some(id)))
            .filter(|m| !query.available_only || m.is_available)
            .cloned()
            .collect();
        menus.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));
        Ok(menus)
    }

    async fn update_menu(
        &self,
        id: Uuid,
        request: MenuRequest,
        now: DateTime<Utc>,
    ) -> Result<Menu> {
        let mut tables = self.tables.write().await;
        tables.ensure_event_exists(request.event_id)?;
        let menu = tables
            .menus
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Menu", id))?;
        request.apply_to(menu, now);
        Ok(menu.clone())
    }

    async fn assign_menu(
        &self,
        id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Menu> {
        let mut tables = self.tables.write().await;
        tables.ensure_event_exists(event_id)?;
        let menu = tables
            .menus
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Menu", id))?;
        menu.event_id = event_id;
        menu.updated_at = now;
        Ok(menu.clone())
    }

    async fn delete_menu(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.menus.remove(&id).is_some())
    }
}

#[async_trait]
impl BookingRepo for MemoryStore {
    async fn create_booking(
        &self,
        user_id: Uuid,
        request: &CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tables = self.tables.write().await;
        let mut event = tables.event(request.event_id)?;
        let has_active = tables
            .bookings
            .values()
            .any(|b| b.event_id == event.id && b.user_id == user_id && b.is_active());

        let booking = booking::open(&mut event, user_id, request, has_active, now)?;
        if tables
            .bookings
            .values()
            .any(|b| b.booking_reference == booking.booking_reference)
        {
            return Err(AppError::Conflict("Booking reference already exists".to_string()));
        }

        tables.events.insert(event.id, event);
        tables.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn get_booking_by_reference(&self, reference: &str) -> Result<Option<Booking>> {
        let tables = self.tables.read().await;
        Ok(tables
            .bookings
            .values()
            .find(|b| b.booking_reference == reference)
            .cloned())
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(bookings)
    }

    async fn pay_booking(
        &self,
        id: Uuid,
        payment: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tables = self.tables.write().await;
        let mut booking = tables.booking(id)?;
        booking::apply_payment(&mut booking, payment, now)?;
        tables.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn check_in_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking> {
        let mut tables = self.tables.write().await;
        let mut booking = tables.booking(id)?;
        booking::check_in(&mut booking, now)?;
        tables.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn cancel_booking(
        &self,
        id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tables = self.tables.write().await;
        let mut booking = tables.booking(id)?;
        let mut event = tables.event(booking.event_id)?;
        booking::cancel(&mut booking, &mut event, reason, now)?;
        tables.events.insert(event.id, event);
        tables.bookings.insert(id, booking.clone());
        Ok(booking)
    }

    async fn approve_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking> {
        let mut tables = self.tables.write().await;
        let mut booking = tables.booking(id)?;
        booking::approve(&mut booking, now)?;
        tables.bookings.insert(id, booking.clone());
        Ok(booking)
    }
}

#[async_trait]
impl AttendeeRepo for MemoryStore {
    async fn register_attendee(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee> {
        let mut tables = self.tables.write().await;
        let mut event = tables.event(event_id)?;
        let existing = tables
            .attendees
            .values()
            .find(|a| a.event_id == event_id && a.user_id == user_id)
            .cloned();

        let attendee =
            registration::register(&mut event, existing.as_ref(), user_id, notes, now)?;
        tables.events.insert(event.id, event);
        tables.attendees.insert(attendee.id, attendee.clone());
        Ok(attendee)
    }

    async fn get_attendee(&self, id: Uuid) -> Result<Option<EventAttendee>> {
        Ok(self.tables.read().await.attendees.get(&id).cloned())
    }

    async fn list_attendees(
        &self,
        event_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> Result<Vec<EventAttendee>> {
        let tables = self.tables.read().await;
        let mut attendees: Vec<EventAttendee> = tables
            .attendees
            .values()
            .filter(|a| event_id.map_or(true, |id| a.event_id == id))
            .filter(|a| user_id.map_or(true, |id| a.user_id == id))
            .cloned()
            .collect();
        attendees.sort_by_key(|a| a.registered_at);
        Ok(attendees)
    }

    async fn check_in_attendee(&self, id: Uuid, now: DateTime<Utc>) -> Result<EventAttendee> {
        let mut tables = self.tables.write().await;
        let mut attendee = tables.attendee(id)?;
        registration::check_in(&mut attendee, now)?;
        tables.attendees.insert(id, attendee.clone());
        Ok(attendee)
    }

    async fn cancel_attendee(&self, id: Uuid, now: DateTime<Utc>) -> Result<EventAttendee> {
        let mut tables = self.tables.write().await;
        let mut attendee = tables.attendee(id)?;
        let mut event = tables.event(attendee.event_id)?;
        registration::cancel(&mut attendee, &mut event, now)?;
        tables.events.insert(event.id, event);
        tables.attendees.insert(id, attendee.clone());
        Ok(attendee)
    }

    async fn mark_attendee_no_show(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee> {
        let mut tables = self.tables.write().await;
        let mut attendee = tables.attendee(id)?;
        registration::mark_no_show(&mut attendee, now)?;
        tables.attendees.insert(id, attendee.clone());
        Ok(attendee)
    }

    async fn complete_attendee_payment(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee> {
        let mut tables = self.tables.write().await;
        let mut attendee = tables.attendee(id)?;
        registration::complete_payment(&mut attendee, now)?;
        tables.attendees.insert(id, attendee.clone());
        Ok(attendee)
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn create_notification(&self, notification: Notification) -> Result<Notification> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&notification.user_id) {
            return Err(AppError::not_found("User", notification.user_id));
        }
        tables
            .notifications
            .insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.tables.read().await.notifications.get(&id).cloned())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let tables = self.tables.read().await;
        let mut notifications: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64> {
        let tables = self.tables.read().await;
        let unread = tables
            .notifications
            .values()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count();
        Ok(unread as i64)
    }

    async fn mark_notification_read(&self, id: Uuid, now: DateTime<Utc>) -> Result<Notification> {
        let mut tables = self.tables.write().await;
        let notification = tables
            .notifications
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Notification", id))?;
        if !notification.is_read {
            notification.is_read = true;
            notification.read_at = Some(now);
        }
        Ok(notification.clone())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for notification in tables
            .notifications
            .values_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            notification.is_read = true;
            notification.read_at = Some(now);
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_notification(&self, id: Uuid) -> Result<bool> {
        Ok(self.tables.write().await.notifications.remove(&id).is_some())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn create_user(&self, user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.user_conflicts(&user) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(login) || u.username == login)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by_key(|u| u.registered_at);
        Ok(users)
    }

    async fn update_user(&self, user: &User) -> Result<User> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user.id) {
            return Err(AppError::not_found("User", user.id));
        }
        if tables.user_conflicts(user) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) {
            return Ok(false);
        }
        if tables.events.values().any(|e| e.created_by == id) {
            return Err(AppError::Conflict(
                "User is still referenced by other records".to_string(),
            ));
        }
        tables.users.remove(&id);
        tables.bookings.retain(|_, b| b.user_id != id);
        tables.attendees.retain(|_, a| a.user_id != id);
        tables.notifications.retain(|_, n| n.user_id != id);
        tables.refresh_tokens.retain(|_, t| t.user_id != id);
        for entry in tables.audit_logs.iter_mut() {
            if entry.user_id == Some(id) {
                entry.user_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl RefreshTokenRepo for MemoryStore {
    async fn create_refresh_token(&self, token: RefreshToken) -> Result<RefreshToken> {
        let mut tables = self.tables.write().await;
        if tables.refresh_tokens.values().any(|t| t.token == token.token) {
            return Err(AppError::Conflict("Refresh token already exists".to_string()));
        }
        tables.refresh_tokens.insert(token.id, token.clone());
        Ok(token)
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let tables = self.tables.read().await;
        Ok(tables
            .refresh_tokens
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn rotate_refresh_token(
        &self,
        presented: &str,
        replacement: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let mut tables = self.tables.write().await;
        let current = tables
            .refresh_tokens
            .values_mut()
            .find(|t| t.token == presented && t.is_active(now))
            .ok_or_else(|| AppError::AuthError("Refresh token is invalid or expired".to_string()))?;
        current.revoked_at = Some(now);
        current.replaced_by = Some(replacement.token.clone());
        tables
            .refresh_tokens
            .insert(replacement.id, replacement.clone());
        Ok(replacement)
    }

    async fn revoke_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write().await;
        match tables
            .refresh_tokens
            .values_mut()
            .find(|t| t.token == token && t.revoked_at.is_none())
        {
            Some(found) => {
                found.revoked_at = Some(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut revoked = 0;
        for token in tables
            .refresh_tokens
            .values_mut()
            .filter(|t| t.user_id == user_id && t.revoked_at.is_none())
        {
            token.revoked_at = Some(now);
            revoked += 1;
        }
        Ok(revoked)
    }
}

#[async_trait]
impl AuditRepo for MemoryStore {
    async fn append_audit(&self, entry: AuditLog) -> Result<()> {
        self.tables.write().await.audit_logs.push(entry);
        Ok(())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLog>> {
        let tables = self.tables.read().await;
        let limit = query.limit() as usize;
        Ok(tables
            .audit_logs
            .iter()
            .rev()
            .filter(|e| {
                query
                    .entity_name
                    .as_deref()
                    .map_or(true, |name| e.entity_name.eq_ignore_ascii_case(name))
            })
            .filter(|e| {
                query
                    .entity_id
                    .as_deref()
                    .map_or(true, |id| e.entity_id == id)
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::{BookingStatus, UserRole};
    use crate::store::Store;

    fn user(name: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name),
            username: name.to_string(),
            first_name: name.to_string(),
            second_name: "Tester".to_string(),
            profile_image: None,
            role: UserRole::User,
            password_hash: "x".to_string(),
            registered_at: now,
            updated_at: now,
        }
    }

    fn event(created_by: Uuid, max: i32, price: i64, is_free: bool) -> Event {
        let mut event = crate::lifecycle::fixtures::event(max, 0, price, is_free);
        event.created_by = created_by;
        event
    }

    fn booking_request(event_id: Uuid, tickets: i32) -> CreateBookingRequest {
        CreateBookingRequest {
            event_id,
            number_of_tickets: tickets,
            special_requests: None,
        }
    }

    async fn seeded(max: i32, price: i64, is_free: bool) -> (Arc<MemoryStore>, User, Event) {
        let store = Arc::new(MemoryStore::new());
        let owner = store.create_user(user("owner")).await.unwrap();
        let event = store
            .create_event(event(owner.id, max, price, is_free))
            .await
            .unwrap();
        (store, owner, event)
    }

    #[tokio::test]
    async fn test_create_booking_persists_booking_and_counter_together() {
        let (store, owner, event) = seeded(10, 0, true).await;
        let booking = store
            .create_booking(owner.id, &booking_request(event.id, 3), Utc::now())
            .await
            .unwrap();

        let stored = store.get_booking(booking.id).await.unwrap().unwrap();
        assert_eq!(stored.booking_reference, booking.booking_reference);
        assert_eq!(stored.total_amount, booking.total_amount);
        assert_eq!(stored.status, BookingStatus::Confirmed);

        let by_reference = store
            .get_booking_by_reference(&booking.booking_reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_reference.id, booking.id);

        let event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_attendees, 3);
    }

    #[tokio::test]
    async fn test_missing_event_is_not_found() {
        let store = MemoryStore::new();
        let err = store
            .create_booking(Uuid::new_v4(), &booking_request(Uuid::new_v4(), 1), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_bookings_never_overbook() {
        let (store, _, event) = seeded(10, 0, true).await;
        let mut handles = Vec::new();
        for _ in 0..25 {
            let store = store.clone();
            let event_id = event.id;
            handles.push(tokio::spawn(async move {
                store
                    .create_booking(Uuid::new_v4(), &booking_request(event_id, 1), Utc::now())
                    .await
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 10);
        let event = store.get_event(event.id).await.unwrap().unwrap();
        assert_eq!(event.current_attendees, 10);
    }

    #[tokio::test]
    async fn test_cancel_booking_releases_seats_and_allows_rebooking() {
        let (store, owner, event) = seeded(5, 20, false).await;
        let booking = store
            .create_booking(owner.id, &booking_request(event.id, 5), Utc::now())
            .await
            .unwrap();
        assert!(store
            .create_booking(owner.id, &booking_request(event.id, 1), Utc::now())
            .await
            .is_err());

        store
            .cancel_booking(booking.id, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(
            store.get_event(event.id).await.unwrap().unwrap().current_attendees,
            0
        );

        let rebooked = store
            .create_booking(owner.id, &booking_request(event.id, 2), Utc::now())
            .await
            .unwrap();
        assert_eq!(rebooked.total_amount, Decimal::from(40));
    }

    #[tokio::test]
    async fn test_venue_referenced_by_event_is_deactivated() {
        let store = MemoryStore::new();
        let owner = store.create_user(user("owner")).await.unwrap();
        let now = Utc::now();
        let venue = Venue {
            id: Uuid::new_v4(),
            name: "Hall".to_string(),
            description: None,
            address: "Main St 1".to_string(),
            city: "Berlin".to_string(),
            capacity: 200,
            price_per_hour: Decimal::from(80),
            contact_email: None,
            contact_phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        let used = store.create_venue(venue.clone()).await.unwrap();
        let unused = store
            .create_venue(Venue {
                id: Uuid::new_v4(),
                ..venue
            })
            .await
            .unwrap();
        let mut at_venue = event(owner.id, 10, 0, true);
        at_venue.venue_id = Some(used.id);
        store.create_event(at_venue).await.unwrap();

        assert_eq!(
            store.remove_venue(used.id, now).await.unwrap(),
            VenueRemoval::Deactivated
        );
        assert!(!store.get_venue(used.id).await.unwrap().unwrap().is_active);
        assert_eq!(
            store.remove_venue(unused.id, now).await.unwrap(),
            VenueRemoval::Deleted
        );
        assert!(store.get_venue(unused.id).await.unwrap().is_none());
        assert_eq!(store.list_venues(false).await.unwrap().len(), 0);
        assert_eq!(store.list_venues(true).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_event_cascades_and_unassigns_menus() {
        let (store, owner, event) = seeded(10, 0, true).await;
        store
            .create_booking(owner.id, &booking_request(event.id, 1), Utc::now())
            .await
            .unwrap();
        store
            .register_attendee(event.id, owner.id, None, Utc::now())
            .await
            .unwrap();
        let now = Utc::now();
        let menu = store
            .create_menu(Menu {
                id: Uuid::new_v4(),
                event_id: Some(event.id),
                name: "Buffet".to_string(),
                description: None,
                category: "buffet".to_string(),
                price_per_person: Decimal::from(15),
                is_vegetarian: true,
                is_vegan: false,
                is_gluten_free: false,
                is_available: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        assert!(store.delete_event(event.id).await.unwrap());
        assert!(store
            .list_bookings(&BookingFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(store.list_attendees(None, None).await.unwrap().is_empty());
        assert_eq!(store.get_menu(menu.id).await.unwrap().unwrap().event_id, None);
        assert!(!store.delete_event(event.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_token_rotation_is_single_use() {
        let store = MemoryStore::new();
        let owner = store.create_user(user("owner")).await.unwrap();
        let now = Utc::now();
        let token = |value: &str| RefreshToken {
            id: Uuid::new_v4(),
            user_id: owner.id,
            token: value.to_string(),
            expires_at: now + Duration::days(1),
            created_at: now,
            revoked_at: None,
            replaced_by: None,
        };
        store.create_refresh_token(token("first")).await.unwrap();
        store
            .rotate_refresh_token("first", token("second"), now)
            .await
            .unwrap();

        let first = store.get_refresh_token("first").await.unwrap().unwrap();
        assert!(!first.is_active(now));
        assert_eq!(first.replaced_by.as_deref(), Some("second"));

        let err = store
            .rotate_refresh_token("first", token("third"), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthError(_)));
        assert_eq!(store.revoke_user_refresh_tokens(owner.id, now).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_user_uniqueness_and_delete_restriction() {
        let (store, owner, _) = seeded(10, 0, true).await;
        let mut clash = user("other");
        clash.email = owner.email.to_uppercase();
        assert!(matches!(
            store.create_user(clash).await.unwrap_err(),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            store.delete_user(owner.id).await.unwrap_err(),
            AppError::Conflict(_)
        ));
        let found = store
            .find_user_by_login(&owner.email.to_uppercase())
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(owner.id));
    }

    #[tokio::test]
    async fn test_store_is_object_safe() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        assert!(store.list_users().await.unwrap().is_empty());
    }
}
