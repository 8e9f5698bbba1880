//! Postgres backend.
//!
//! Lifecycle operations run in a transaction that locks the rows it reads
//! (`SELECT ... FOR UPDATE`), so concurrent bookings against the same event
//! are serialised on the event row and capacity cannot be overshot.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres, QueryBuilder};
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
use crate::utils::error::{map_db_error, AppError, Result};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("migration failed: {}", e)))
    }
}

fn like_pattern(text: &str) -> String {
    let escaped = text
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

async fn lock_event(conn: &mut PgConnection, id: Uuid) -> Result<Event> {
    sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Event", id))
}

async fn lock_booking(conn: &mut PgConnection, id: Uuid) -> Result<Booking> {
    sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Booking", id))
}

async fn lock_attendee(conn: &mut PgConnection, id: Uuid) -> Result<EventAttendee> {
    sqlx::query_as::<_, EventAttendee>("SELECT * FROM event_attendees WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::not_found("Registration", id))
}

async fn write_event(conn: &mut PgConnection, event: &Event) -> Result<Event> {
    sqlx::query_as::<_, Event>(
        r#"UPDATE events SET
            title = $2, description = $3, start_date = $4, end_date = $5, location = $6,
            venue_id = $7, max_attendees = $8, current_attendees = $9, category = $10,
            status = $11, ticket_price = $12, is_free = $13, is_public = $14,
            is_featured = $15, image_url = $16, updated_at = $17
        WHERE id = $1
        RETURNING *"#,
    )
    .bind(event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(event.start_date)
    .bind(event.end_date)
    .bind(&event.location)
    .bind(event.venue_id)
    .bind(event.max_attendees)
    .bind(event.current_attendees)
    .bind(&event.category)
    .bind(event.status)
    .bind(event.ticket_price)
    .bind(event.is_free)
    .bind(event.is_public)
    .bind(event.is_featured)
    .bind(&event.image_url)
    .bind(event.updated_at)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_db_error(e, "Event"))?
    .ok_or_else(|| AppError::not_found("Event", event.id))
}

async fn insert_booking(conn: &mut PgConnection, b: &Booking) -> Result<Booking> {
    sqlx::query_as::<_, Booking>(
        r#"INSERT INTO bookings (
            id, event_id, user_id, booking_reference, status, number_of_tickets,
            total_amount, amount_paid, payment_method, transaction_id, special_requests,
            is_checked_in, checked_in_at, is_approved_by_admin, approved_at,
            cancellation_reason, cancelled_at, booked_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
        RETURNING *"#,
    )
    .bind(b.id)
    .bind(b.event_id)
    .bind(b.user_id)
    .bind(&b.booking_reference)
    .bind(b.status)
    .bind(b.number_of_tickets)
    .bind(b.total_amount)
    .bind(b.amount_paid)
    .bind(&b.payment_method)
    .bind(&b.transaction_id)
    .bind(&b.special_requests)
    .bind(b.is_checked_in)
    .bind(b.checked_in_at)
    .bind(b.is_approved_by_admin)
    .bind(b.approved_at)
    .bind(&b.cancellation_reason)
    .bind(b.cancelled_at)
    .bind(b.booked_at)
    .bind(b.updated_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_db_error(e, "Booking"))
}

async fn write_booking(conn: &mut PgConnection, b: &Booking) -> Result<Booking> {
    let updated = sqlx::query_as::<_, Booking>(
        r#"UPDATE bookings SET
            status = $2, amount_paid = $3, payment_method = $4, transaction_id = $5,
            is_checked_in = $6, checked_in_at = $7, is_approved_by_admin = $8,
            approved_at = $9, cancellation_reason = $10, cancelled_at = $11, updated_at = $12
        WHERE id = $1
        RETURNING *"#,
    )
    .bind(b.id)
    .bind(b.status)
    .bind(b.amount_paid)
    .bind(&b.payment_method)
    .bind(&b.transaction_id)
    .bind(b.is_checked_in)
    .bind(b.checked_in_at)
    .bind(b.is_approved_by_admin)
    .bind(b.approved_at)
    .bind(&b.cancellation_reason)
    .bind(b.cancelled_at)
    .bind(b.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(updated)
}

async fn write_attendee(conn: &mut PgConnection, a: &EventAttendee) -> Result<EventAttendee> {
    let saved = sqlx::query_as::<_, EventAttendee>(
        r#"INSERT INTO event_attendees (
            id, event_id, user_id, status, payment_required, payment_completed, notes,
            registered_at, checked_in_at, cancelled_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            payment_required = EXCLUDED.payment_required,
            payment_completed = EXCLUDED.payment_completed,
            notes = EXCLUDED.notes,
            registered_at = EXCLUDED.registered_at,
            checked_in_at = EXCLUDED.checked_in_at,
            cancelled_at = EXCLUDED.cancelled_at,
            updated_at = EXCLUDED.updated_at
        RETURNING *"#,
    )
    .bind(a.id)
    .bind(a.event_id)
    .bind(a.user_id)
    .bind(a.status)
    .bind(a.payment_required)
    .bind(a.payment_completed)
    .bind(&a.notes)
    .bind(a.registered_at)
    .bind(a.checked_in_at)
    .bind(a.cancelled_at)
    .bind(a.updated_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_db_error(e, "Registration"))?;
    Ok(saved)
}

#[async_trait]
impl EventRepo for PgStore {
    async fn create_event(&self, e: Event) -> Result<Event> {
        sqlx::query_as::<_, Event>(
            r#"INSERT INTO events (
                id, title, description, start_date, end_date, location, venue_id, created_by,
                max_attendees, current_attendees, category, status, ticket_price, is_free,
                is_public, is_featured, image_url, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *"#,
        )
        .bind(e.id)
        .bind(&e.title)
        .bind(&e.description)
        .bind(e.start_date)
        .bind(e.end_date)
        .bind(&e.location)
        .bind(e.venue_id)
        .bind(e.created_by)
        .bind(e.max_attendees)
        .bind(e.current_attendees)
        .bind(&e.category)
        .bind(e.status)
        .bind(e.ticket_price)
        .bind(e.is_free)
        .bind(e.is_public)
        .bind(e.is_featured)
        .bind(&e.image_url)
        .bind(e.created_at)
        .bind(e.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| map_db_error(err, "Event"))
    }

    async fn get_event(&self, id: Uuid) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM events WHERE TRUE");
        if filter.public_only {
            qb.push(" AND is_public");
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(category) = &filter.category {
            qb.push(" AND LOWER(category) = LOWER(")
                .push_bind(category.clone())
                .push(")");
        }
        if let Some(venue_id) = filter.venue_id {
            qb.push(" AND venue_id = ").push_bind(venue_id);
        }
        if let Some(after) = filter.starts_after {
            qb.push(" AND start_date >= ").push_bind(after);
        }
        if let Some(before) = filter.starts_before {
            qb.push(" AND start_date <= ").push_bind(before);
        }
        if let Some(owner) = filter.created_by {
            qb.push(" AND created_by = ").push_bind(owner);
        }
        if let Some(text) = &filter.text {
            let pattern = like_pattern(text);
            qb.push(" AND (title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR location ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        qb.push(" ORDER BY start_date, created_at");

        let events = qb.build_query_as::<Event>().fetch_all(&self.pool).await?;
        Ok(events)
    }

    async fn update_event(
        &self,
        id: Uuid,
        request: EventRequest,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        let mut tx = self.pool.begin().await?;
        let mut event = lock_event(&mut tx, id).await?;
        request.apply_to(&mut event, now)?;
        let event = write_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(event)
    }

    async fn set_event_status(
        &self,
        id: Uuid,
        status: EventStatus,
        now: DateTime<Utc>,
    ) -> Result<Event> {
        sqlx::query_as::<_, Event>(
            "UPDATE events SET status = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Event", id))
    }

    async fn delete_event(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl VenueRepo for PgStore {
    async fn create_venue(&self, v: Venue) -> Result<Venue> {
        sqlx::query_as::<_, Venue>(
            r#"INSERT INTO venues (
                id, name, description, address, city, capacity, price_per_hour,
                contact_email, contact_phone, is_active, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *"#,
        )
        .bind(v.id)
        .bind(&v.name)
        .bind(&v.description)
        .bind(&v.address)
        .bind(&v.city)
        .bind(v.capacity)
        .bind(v.price_per_hour)
        .bind(&v.contact_email)
        .bind(&v.contact_phone)
        .bind(v.is_active)
        .bind(v.created_at)
        .bind(v.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Venue"))
    }

    async fn get_venue(&self, id: Uuid) -> Result<Option<Venue>> {
        let venue = sqlx::query_as::<_, Venue>("SELECT * FROM venues WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(venue)
    }

    async fn list_venues(&self, include_inactive: bool) -> Result<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>(
            "SELECT * FROM venues WHERE is_active OR $1 ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(venues)
    }

    async fn search_venues(&self, text: &str) -> Result<Vec<Venue>> {
        let venues = sqlx::query_as::<_, Venue>(
            r#"SELECT * FROM venues
            WHERE is_active AND (name ILIKE $1 OR address ILIKE $1 OR city ILIKE $1)
            ORDER BY name"#,
        )
        .bind(like_pattern(text))
        .fetch_all(&self.pool)
        .await?;
        Ok(venues)
    }

    async fn update_venue(
        &self,
        id: Uuid,
        request: VenueRequest,
        now: DateTime<Utc>,
    ) -> Result<Venue> {
        let mut tx = self.pool.begin().await?;
        let mut venue = sqlx::query_as::<_, Venue>("SELECT * FROM venues WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Venue", id))?;
        request.apply_to(&mut venue, now);
        let venue = sqlx::query_as::<_, Venue>(
            r#"UPDATE venues SET
                name = $2, description = $3, address = $4, city = $5, capacity = $6,
                price_per_hour = $7, contact_email = $8, contact_phone = $9, is_active = $10,
                updated_at = $11
            WHERE id = $1
            RETURNING *"#,
        )
        .bind(venue.id)
        .bind(&venue.name)
        .bind(&venue.description)
        .bind(&venue.address)
        .bind(&venue.city)
        .bind(venue.capacity)
        .bind(venue.price_per_hour)
        .bind(&venue.contact_email)
        .bind(&venue.contact_phone)
        .bind(venue.is_active)
        .bind(venue.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(venue)
    }

    async fn remove_venue(&self, id: Uuid, now: DateTime<Utc>) -> Result<VenueRemoval> {
        let mut tx = self.pool.begin().await?;
        let exists = sqlx::query_scalar::<_, Uuid>("SELECT id FROM venues WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(AppError::not_found("Venue", id));
        }
        let referenced = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM events WHERE venue_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let removal = if referenced {
            sqlx::query("UPDATE venues SET is_active = FALSE, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            VenueRemoval::Deactivated
        } else {
            sqlx::query("DELETE FROM venues WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            VenueRemoval::Deleted
        };
        tx.commit().await?;
        Ok(removal)
    }
}

#[async_trait]
impl MenuRepo for PgStore {
    async fn create_menu(&self, m: Menu) -> Result<Menu> {
        sqlx::query_as::<_, Menu>(
            r#"INSERT INTO menus (
                id, event_id, name, description, category, price_per_person, is_vegetarian,
                is_vegan, is_gluten_free, is_available, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *"#,
        )
        .bind(m.id)
        .bind(m.event_id)
        .bind(&m.name)
        .bind(&m.description)
        .bind(&m.category)
        .bind(m.price_per_person)
        .bind(m.is_vegetarian)
        .bind(m.is_vegan)
        .bind(m.is_gluten_free)
        .bind(m.is_available)
        .bind(m.created_at)
        .bind(m.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Menu"))
    }

    async fn get_menu(&self, id: Uuid) -> Result<Option<Menu>> {
        let menu = sqlx::query_as::<_, Menu>("SELECT * FROM menus WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(menu)
    }

    async fn list_menus(&self, query: &MenuQuery) -> Result<Vec<Menu>> {
        let menus = sqlx::query_as::<_, Menu>(
            r#"SELECT * FROM menus
            WHERE ($1::uuid IS NULL OR event_id = $1) AND (is_available OR NOT $2)
            ORDER BY category, name"#,
        )
        .bind(query.event_id)
        .bind(query.available_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(menus)
    }

    async fn update_menu(
        &self,
        id: Uuid,
        request: MenuRequest,
        now: DateTime<Utc>,
    ) -> Result<Menu> {
        let mut tx = self.pool.begin().await?;
        let mut menu = sqlx::query_as::<_, Menu>("SELECT * FROM menus WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Menu", id))?;
        request.apply_to(&mut menu, now);
        let menu = sqlx::query_as::<_, Menu>(
            r#"UPDATE menus SET
                event_id = $2, name = $3, description = $4, category = $5,
                price_per_person = $6, is_vegetarian = $7, is_vegan = $8,
                is_gluten_free = $9, is_available = $10, updated_at = $11
            WHERE id = $1
            RETURNING *"#,
        )
        .bind(menu.id)
        .bind(menu.event_id)
        .bind(&menu.name)
        .bind(&menu.description)
        .bind(&menu.category)
        .bind(menu.price_per_person)
        .bind(menu.is_vegetarian)
        .bind(menu.is_vegan)
        .bind(menu.is_gluten_free)
        .bind(menu.is_available)
        .bind(menu.updated_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error(e, "Menu"))?;
        tx.commit().await?;
        Ok(menu)
    }

    async fn assign_menu(
        &self,
        id: Uuid,
        event_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<Menu> {
        sqlx::query_as::<_, Menu>(
            "UPDATE menus SET event_id = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(event_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Menu"))?
        .ok_or_else(|| AppError::not_found("Menu", id))
    }

    async fn delete_menu(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BookingRepo for PgStore {
    async fn create_booking(
        &self,
        user_id: Uuid,
        request: &CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut event = lock_event(&mut tx, request.event_id).await?;
        let has_active = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (
                SELECT 1 FROM bookings
                WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'
            )"#,
        )
        .bind(event.id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let booking = booking::open(&mut event, user_id, request, has_active, now)?;
        let booking = insert_booking(&mut tx, &booking).await?;
        write_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(booking)
    }

    async fn get_booking_by_reference(&self, reference: &str) -> Result<Option<Booking>> {
        let booking =
            sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_reference = $1")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?;
        Ok(booking)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> Result<Vec<Booking>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM bookings WHERE TRUE");
        if let Some(event_id) = filter.event_id {
            qb.push(" AND event_id = ").push_bind(event_id);
        }
        if let Some(user_id) = filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        qb.push(" ORDER BY booked_at DESC");
        let bookings = qb.build_query_as::<Booking>().fetch_all(&self.pool).await?;
        Ok(bookings)
    }

    async fn pay_booking(
        &self,
        id: Uuid,
        payment: &PaymentRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, id).await?;
        booking::apply_payment(&mut booking, payment, now)?;
        let booking = write_booking(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn check_in_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, id).await?;
        booking::check_in(&mut booking, now)?;
        let booking = write_booking(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn cancel_booking(
        &self,
        id: Uuid,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        // Event first: same lock order as create_booking.
        let event_id = sqlx::query_scalar::<_, Uuid>("SELECT event_id FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Booking", id))?;
        let mut event = lock_event(&mut tx, event_id).await?;
        let mut booking = lock_booking(&mut tx, id).await?;

        booking::cancel(&mut booking, &mut event, reason, now)?;
        let booking = write_booking(&mut tx, &booking).await?;
        write_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn approve_booking(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;
        let mut booking = lock_booking(&mut tx, id).await?;
        booking::approve(&mut booking, now)?;
        let booking = write_booking(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(booking)
    }
}

#[async_trait]
impl AttendeeRepo for PgStore {
    async fn register_attendee(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee> {
        let mut tx = self.pool.begin().await?;
        let mut event = lock_event(&mut tx, event_id).await?;
        let existing = sqlx::query_as::<_, EventAttendee>(
            "SELECT * FROM event_attendees WHERE event_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let attendee =
            registration::register(&mut event, existing.as_ref(), user_id, notes, now)?;
        let attendee = write_attendee(&mut tx, &attendee).await?;
        write_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(attendee)
    }

    async fn get_attendee(&self, id: Uuid) -> Result<Option<EventAttendee>> {
        let attendee =
            sqlx::query_as::<_, EventAttendee>("SELECT * FROM event_attendees WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(attendee)
    }

    async fn list_attendees(
        &self,
        event_id: Option<Uuid>,
        user_id: Option<Uuid>,
    ) -> Result<Vec<EventAttendee>> {
        let attendees = sqlx::query_as::<_, EventAttendee>(
            r#"SELECT * FROM event_attendees
            WHERE ($1::uuid IS NULL OR event_id = $1) AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY registered_at"#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attendees)
    }

    async fn check_in_attendee(&self, id: Uuid, now: DateTime<Utc>) -> Result<EventAttendee> {
        let mut tx = self.pool.begin().await?;
        let mut attendee = lock_attendee(&mut tx, id).await?;
        registration::check_in(&mut attendee, now)?;
        let attendee = write_attendee(&mut tx, &attendee).await?;
        tx.commit().await?;
        Ok(attendee)
    }

    async fn cancel_attendee(&self, id: Uuid, now: DateTime<Utc>) -> Result<EventAttendee> {
        let mut tx = self.pool.begin().await?;
        let event_id =
            sqlx::query_scalar::<_, Uuid>("SELECT event_id FROM event_attendees WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::not_found("Registration", id))?;
        let mut event = lock_event(&mut tx, event_id).await?;
        let mut attendee = lock_attendee(&mut tx, id).await?;

        registration::cancel(&mut attendee, &mut event, now)?;
        let attendee = write_attendee(&mut tx, &attendee).await?;
        write_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(attendee)
    }

    async fn mark_attendee_no_show(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee> {
        let mut tx = self.pool.begin().await?;
        let mut attendee = lock_attendee(&mut tx, id).await?;
        registration::mark_no_show(&mut attendee, now)?;
        let attendee = write_attendee(&mut tx, &attendee).await?;
        tx.commit().await?;
        Ok(attendee)
    }

    async fn complete_attendee_payment(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<EventAttendee> {
        let mut tx = self.pool.begin().await?;
        let mut attendee = lock_attendee(&mut tx, id).await?;
        registration::complete_payment(&mut attendee, now)?;
        let attendee = write_attendee(&mut tx, &attendee).await?;
        tx.commit().await?;
        Ok(attendee)
    }
}

#[async_trait]
impl NotificationRepo for PgStore {
    async fn create_notification(&self, n: Notification) -> Result<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"INSERT INTO notifications (
                id, user_id, notification_type, title, message, event_id, booking_id,
                is_read, read_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *"#,
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.notification_type)
        .bind(&n.title)
        .bind(&n.message)
        .bind(n.event_id)
        .bind(n.booking_id)
        .bind(n.is_read)
        .bind(n.read_at)
        .bind(n.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Notification"))
    }

    async fn get_notification(&self, id: Uuid) -> Result<Option<Notification>> {
        let notification =
            sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"SELECT * FROM notifications
            WHERE user_id = $1 AND (NOT is_read OR NOT $2)
            ORDER BY created_at DESC"#,
        )
        .bind(user_id)
        .bind(unread_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn count_unread_notifications(&self, user_id: Uuid) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_notification_read(&self, id: Uuid, now: DateTime<Utc>) -> Result<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, $2)
            WHERE id = $1
            RETURNING *"#,
        )
        .bind(id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::not_found("Notification", id))
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE, read_at = $2 WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create_user(&self, u: User) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"INSERT INTO users (
                id, email, username, first_name, second_name, profile_image, role,
                password_hash, registered_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *"#,
        )
        .bind(u.id)
        .bind(&u.email)
        .bind(&u.username)
        .bind(&u.first_name)
        .bind(&u.second_name)
        .bind(&u.profile_image)
        .bind(u.role)
        .bind(&u.password_hash)
        .bind(u.registered_at)
        .bind(u.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User"))
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) OR username = $1 LIMIT 1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY registered_at")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_user(&self, u: &User) -> Result<User> {
        sqlx::query_as::<_, User>(
            r#"UPDATE users SET
                email = $2, username = $3, first_name = $4, second_name = $5,
                profile_image = $6, role = $7, password_hash = $8, updated_at = $9
            WHERE id = $1
            RETURNING *"#,
        )
        .bind(u.id)
        .bind(&u.email)
        .bind(&u.username)
        .bind(&u.first_name)
        .bind(&u.second_name)
        .bind(&u.profile_image)
        .bind(u.role)
        .bind(&u.password_hash)
        .bind(u.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "User"))?
        .ok_or_else(|| AppError::not_found("User", u.id))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_db_error(e, "User"))?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RefreshTokenRepo for PgStore {
    async fn create_refresh_token(&self, t: RefreshToken) -> Result<RefreshToken> {
        sqlx::query_as::<_, RefreshToken>(
            r#"INSERT INTO refresh_tokens (
                id, user_id, token, expires_at, created_at, revoked_at, replaced_by
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *"#,
        )
        .bind(t.id)
        .bind(t.user_id)
        .bind(&t.token)
        .bind(t.expires_at)
        .bind(t.created_at)
        .bind(t.revoked_at)
        .bind(&t.replaced_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_db_error(e, "Refresh token"))
    }

    async fn get_refresh_token(&self, token: &str) -> Result<Option<RefreshToken>> {
        let found =
            sqlx::query_as::<_, RefreshToken>("SELECT * FROM refresh_tokens WHERE token = $1")
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found)
    }

    async fn rotate_refresh_token(
        &self,
        presented: &str,
        replacement: RefreshToken,
        now: DateTime<Utc>,
    ) -> Result<RefreshToken> {
        let mut tx = self.pool.begin().await?;
        let revoked = sqlx::query(
            r#"UPDATE refresh_tokens SET revoked_at = $2, replaced_by = $3
            WHERE token = $1 AND revoked_at IS NULL AND expires_at > $2"#,
        )
        .bind(presented)
        .bind(now)
        .bind(&replacement.token)
        .execute(&mut *tx)
        .await?;
        if revoked.rows_affected() == 0 {
            return Err(AppError::AuthError(
                "Refresh token is invalid or expired".to_string(),
            ));
        }
        let issued = sqlx::query_as::<_, RefreshToken>(
            r#"INSERT INTO refresh_tokens (
                id, user_id, token, expires_at, created_at, revoked_at, replaced_by
            ) VALUES ($1, $2, $3, $4, $5, NULL, NULL)
            RETURNING *"#,
        )
        .bind(replacement.id)
        .bind(replacement.user_id)
        .bind(&replacement.token)
        .bind(replacement.expires_at)
        .bind(replacement.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_db_error(e, "Refresh token"))?;
        tx.commit().await?;
        Ok(issued)
    }

    async fn revoke_refresh_token(&self, token: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE token = $1 AND revoked_at IS NULL",
        )
        .bind(token)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_user_refresh_tokens(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = $2 WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AuditRepo for PgStore {
    async fn append_audit(&self, entry: AuditLog) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO audit_logs (id, entity_name, entity_id, action, user_id, details, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(entry.id)
        .bind(&entry.entity_name)
        .bind(&entry.entity_id)
        .bind(entry.action)
        .bind(entry.user_id)
        .bind(&entry.details)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit(&self, query: &AuditQuery) -> Result<Vec<AuditLog>> {
        let entries = sqlx::query_as::<_, AuditLog>(
            r#"SELECT * FROM audit_logs
            WHERE ($1::text IS NULL OR LOWER(entity_name) = LOWER($1))
              AND ($2::text IS NULL OR entity_id = $2)
            ORDER BY timestamp DESC
            LIMIT $3"#,
        )
        .bind(&query.entity_name)
        .bind(&query.entity_id)
        .bind(query.limit())
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
