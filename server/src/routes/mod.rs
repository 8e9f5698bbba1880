use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, HttpSettings};
use crate::handlers::{
    attendees, audit, auth, bookings, clients, events, health_check, menus, notifications,
    profile, search, venues,
};
use crate::state::AppState;

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
}

fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(profile::get_profile).put(profile::update_profile))
        .route("/password", put(profile::change_password))
}

fn client_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(clients::list_clients))
        .route("/:id", get(clients::get_client).delete(clients::delete_client))
        .route("/:id/role", put(clients::set_role))
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list_events).post(events::create_event))
        .route("/mine", get(events::my_events))
        .route(
            "/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/:id/status", patch(events::update_event_status))
        .route("/:id/bookings", get(events::event_bookings))
        .route("/:id/attendees", get(events::event_attendees))
        .route("/:id/menus", get(events::event_menus))
}

fn venue_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(venues::list_venues).post(venues::create_venue))
        .route(
            "/:id",
            get(venues::get_venue)
                .put(venues::update_venue)
                .delete(venues::delete_venue),
        )
}

fn menu_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(menus::list_menus).post(menus::create_menu))
        .route(
            "/:id",
            get(menus::get_menu)
                .put(menus::update_menu)
                .delete(menus::delete_menu),
        )
        .route("/:id/assign", put(menus::assign_menu))
}

fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(bookings::list_bookings).post(bookings::create_booking))
        .route("/mine", get(bookings::my_bookings))
        .route("/reference/:reference", get(bookings::get_booking_by_reference))
        .route("/:id", get(bookings::get_booking))
        .route("/:id/payment", post(bookings::pay_booking))
        .route("/:id/checkin", post(bookings::check_in_booking))
        .route("/:id/cancel", post(bookings::cancel_booking))
        .route("/:id/approve", post(bookings::approve_booking))
}

fn attendee_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(attendees::register))
        .route("/mine", get(attendees::my_registrations))
        .route("/:id", get(attendees::get_registration))
        .route("/:id/checkin", post(attendees::check_in))
        .route("/:id/cancel", post(attendees::cancel))
        .route("/:id/no-show", post(attendees::mark_no_show))
        .route("/:id/payment", post(attendees::complete_payment))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(notifications::list_notifications).post(notifications::send_notification),
        )
        .route("/unread-count", get(notifications::unread_count))
        .route("/read-all", patch(notifications::mark_all_read))
        .route("/:id", axum::routing::delete(notifications::delete_notification))
        .route("/:id/read", patch(notifications::mark_read))
}

pub fn create_routes(state: AppState, http: &HttpSettings) -> Router {
    let api = Router::new()
        .nest("/Auth", auth_routes())
        .nest("/Profile", profile_routes())
        .nest("/Clients", client_routes())
        .nest("/Event", event_routes())
        .nest("/Venues", venue_routes())
        .nest("/Menus", menu_routes())
        .nest("/Bookings", booking_routes())
        .nest("/EventAttendees", attendee_routes())
        .nest("/Notifications", notification_routes())
        .route("/Search", get(search::search))
        .route("/AuditLogs", get(audit::list_audit_logs));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .with_state(state)
        .layer(create_security_headers_layer(http.include_hsts))
        .layer(create_cors_layer(&http.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}
