use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use eventdesk_server::auth::{TokenConfig, TokenIssuer};
use eventdesk_server::config::HttpSettings;
use eventdesk_server::create_routes;
use eventdesk_server::models::UserRole;
use eventdesk_server::state::AppState;
use eventdesk_server::store::{MemoryStore, UserRepo};

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

struct Session {
    token: String,
    refresh_token: String,
    user_id: Uuid,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let tokens = TokenIssuer::new(TokenConfig {
            signing_key: "integration-test-signing-key".to_string(),
            issuer: "eventdesk".to_string(),
            audience: "eventdesk-clients".to_string(),
            access_token_ttl: Duration::minutes(60),
            refresh_token_ttl: Duration::days(1),
        });
        let state = AppState::new(store.clone(), tokens);
        let router = create_routes(state, &HttpSettings::default());
        Self { router, store }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    async fn register(&self, name: &str) -> Session {
        let (status, body) = self
            .post(
                "/api/Auth/register",
                None,
                json!({
                    "email": format!("{}@example.com", name),
                    "username": name,
                    "password": "password-123",
                    "firstName": name,
                    "secondName": "Tester",
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        session_from(&body)
    }

    async fn admin(&self, name: &str) -> Session {
        let session = self.register(name).await;
        let mut user = self
            .store
            .get_user(session.user_id)
            .await
            .unwrap()
            .unwrap();
        user.role = UserRole::Admin;
        self.store.update_user(&user).await.unwrap();
        session
    }

    async fn create_event(&self, token: &str, max: i32, price: f64, is_free: bool) -> Value {
        self.create_event_with(token, json!({
            "title": "Rust Meetup",
            "description": "Talks about ownership",
            "startDate": "2031-05-01T18:00:00Z",
            "endDate": "2031-05-01T21:00:00Z",
            "location": "Community Hall",
            "maxAttendees": max,
            "category": "Tech",
            "status": "published",
            "ticketPrice": price,
            "isFree": is_free,
        }))
        .await
    }

    async fn create_event_with(&self, token: &str, body: Value) -> Value {
        let (status, body) = self.post("/api/Event", Some(token), body).await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["data"].clone()
    }

    async fn book(&self, token: &str, event_id: &str, tickets: i32) -> (StatusCode, Value) {
        self.post(
            "/api/Bookings",
            Some(token),
            json!({ "eventId": event_id, "numberOfTickets": tickets }),
        )
        .await
    }

    async fn current_attendees(&self, event_id: &str) -> i64 {
        self.event_counter(None, event_id).await
    }

    async fn current_attendees_as(&self, token: &str, event_id: &str) -> i64 {
        self.event_counter(Some(token), event_id).await
    }

    async fn event_counter(&self, token: Option<&str>, event_id: &str) -> i64 {
        let (status, body) = self.get(&format!("/api/Event/{}", event_id), token).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["currentAttendees"].as_i64().unwrap()
    }
}

fn session_from(body: &Value) -> Session {
    Session {
        token: body["data"]["accessToken"].as_str().unwrap().to_string(),
        refresh_token: body["data"]["refreshToken"].as_str().unwrap().to_string(),
        user_id: body["data"]["user"]["id"].as_str().unwrap().parse().unwrap(),
    }
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check_reports_service_and_security_headers() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["service"], "eventdesk-api");
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let app = TestApp::new();
    let session = app.register("grace").await;

    let (status, body) = app.get("/api/Profile", Some(&session.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "grace");
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"].get("passwordHash").is_none());

    let (status, body) = app
        .post(
            "/api/Auth/login",
            None,
            json!({ "login": "GRACE@example.com", "password": "password-123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["accessToken"].is_string());

    let (status, body) = app
        .post(
            "/api/Auth/login",
            None,
            json!({ "login": "grace", "password": "wrong-password" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");

    let (status, _) = app
        .post(
            "/api/Auth/register",
            None,
            json!({
                "email": "grace@example.com",
                "username": "grace2",
                "password": "password-123",
                "firstName": "Grace",
                "secondName": "Hopper",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_registration_is_a_validation_error() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/Auth/register",
            None,
            json!({
                "email": "not-an-email",
                "username": "ab",
                "password": "short",
                "firstName": "A",
                "secondName": "B",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_authentication_and_authorization_are_enforced() {
    let app = TestApp::new();
    let (status, body) = app
        .post("/api/Event", None, json!({ "title": "x" }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");

    let (status, _) = app.get("/api/Profile", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let user = app.register("mallory").await;
    let (status, body) = app
        .post(
            "/api/Venues",
            Some(&user.token),
            json!({ "name": "Hall", "address": "1 Main St", "city": "Lagos", "capacity": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app.get("/api/AuditLogs", Some(&user.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_booking_respects_capacity() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let first = app.register("first").await;
    let second = app.register("second").await;
    let event = app.create_event(&organizer.token, 10, 0.0, true).await;
    let event_id = id_of(&event);

    let (status, _) = app.book(&first.token, &event_id, 9).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.current_attendees(&event_id).await, 9);

    let (status, body) = app.book(&second.token, &event_id, 2).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BUSINESS_RULE_VIOLATION");
    assert_eq!(app.current_attendees(&event_id).await, 9);

    let (status, body) = app.book(&second.token, &event_id, 1).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(app.current_attendees(&event_id).await, 10);
}

#[tokio::test]
async fn test_free_event_booking_is_confirmed_immediately() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let event = app.create_event(&organizer.token, 100, 25.0, true).await;
    assert_eq!(event["ticketPrice"].as_f64(), Some(0.0));

    let (status, body) = app.book(&guest.token, &id_of(&event), 3).await;
    assert_eq!(status, StatusCode::CREATED);
    let booking = &body["data"];
    assert_eq!(booking["status"], "confirmed");
    assert_eq!(booking["totalAmount"].as_f64(), Some(0.0));
    let reference = booking["bookingReference"].as_str().unwrap();
    assert!(reference.starts_with("BK"));
    assert_eq!(reference.len(), 16);

    for uri in [
        format!("/api/Bookings/{}", id_of(booking)),
        format!("/api/Bookings/reference/{}", reference),
    ] {
        let (status, body) = app.get(&uri, Some(&guest.token)).await;
        assert_eq!(status, StatusCode::OK);
        let fetched = &body["data"];
        assert_eq!(fetched["id"], booking["id"]);
        assert_eq!(fetched["bookingReference"], booking["bookingReference"]);
        assert_eq!(fetched["totalAmount"], booking["totalAmount"]);
        assert_eq!(fetched["status"], booking["status"]);
    }
}

#[tokio::test]
async fn test_paid_booking_fetched_by_id_matches_creation() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let event = app.create_event(&organizer.token, 20, 12.5, false).await;

    let (_, body) = app.book(&guest.token, &id_of(&event), 3).await;
    let booking = body["data"].clone();
    let (status, body) = app
        .get(&format!("/api/Bookings/{}", id_of(&booking)), Some(&guest.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bookingReference"], booking["bookingReference"]);
    assert_eq!(body["data"]["totalAmount"].as_f64(), Some(37.5));
    assert_eq!(body["data"]["status"], "pending");

    let (status, _) = app
        .get(&format!("/api/Bookings/{}", id_of(&booking)), Some(&organizer.token))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_prices_outside_the_stored_range_are_rejected() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let event_body = |price: Value| {
        json!({
            "title": "Gala",
            "startDate": "2031-09-01T18:00:00Z",
            "endDate": "2031-09-01T23:00:00Z",
            "location": "Opera House",
            "maxAttendees": 50,
            "category": "Music",
            "ticketPrice": price,
            "isFree": false,
        })
    };

    for price in [json!(5e28), json!(10000000000.0), json!(10.001)] {
        let (status, body) = app.post("/api/Event", Some(&organizer.token), event_body(price)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    let event = app
        .create_event_with(&organizer.token, event_body(json!(9999999999.99)))
        .await;
    let (status, body) = app.book(&guest.token, &id_of(&event), 2).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let total = body["data"]["totalAmount"].as_f64().unwrap();
    assert!((total - 19999999999.98).abs() < 0.01);
    assert_eq!(body["data"]["status"], "pending");
}

#[tokio::test]
async fn test_private_events_cannot_be_booked_by_outsiders() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let outsider = app.register("outsider").await;
    let event = app
        .create_event_with(
            &organizer.token,
            json!({
                "title": "Team offsite",
                "startDate": "2031-03-10T09:00:00Z",
                "endDate": "2031-03-10T17:00:00Z",
                "location": "Cabin",
                "maxAttendees": 12,
                "category": "Business",
                "isFree": true,
                "isPublic": false,
            }),
        )
        .await;
    let event_id = id_of(&event);

    let (status, body) = app.book(&outsider.token, &event_id, 1).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    let (status, _) = app
        .post("/api/EventAttendees", Some(&outsider.token), json!({ "eventId": event_id }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.current_attendees_as(&organizer.token, &event_id).await, 0);

    let (status, _) = app.book(&organizer.token, &event_id, 1).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.current_attendees_as(&organizer.token, &event_id).await, 1);
}

#[tokio::test]
async fn test_paid_booking_payment_flow_and_check_in() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let event = app.create_event(&organizer.token, 100, 50.0, false).await;

    let (status, body) = app.book(&guest.token, &id_of(&event), 2).await;
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = id_of(&body["data"]);
    assert_eq!(body["data"]["totalAmount"].as_f64(), Some(100.0));
    assert_eq!(body["data"]["status"], "pending");

    let pay = |amount: f64| json!({ "amount": amount, "paymentMethod": "card", "transactionId": "tx-1" });
    let payment_uri = format!("/api/Bookings/{}/payment", booking_id);
    let checkin_uri = format!("/api/Bookings/{}/checkin", booking_id);

    let (status, _) = app.post(&checkin_uri, Some(&organizer.token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post(&payment_uri, Some(&guest.token), pay(40.0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amountPaid"].as_f64(), Some(40.0));
    assert_eq!(body["data"]["status"], "pending");

    let (status, _) = app.post(&payment_uri, Some(&guest.token), pay(61.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post(&payment_uri, Some(&guest.token), pay(0.0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post(&payment_uri, Some(&guest.token), pay(59.999)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    let (_, body) = app
        .get(&format!("/api/Bookings/{}", booking_id), Some(&guest.token))
        .await;
    assert_eq!(body["data"]["amountPaid"].as_f64(), Some(40.0));
    assert_eq!(body["data"]["status"], "pending");

    let (status, body) = app.post(&payment_uri, Some(&guest.token), pay(60.0)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["amountPaid"].as_f64(), Some(100.0));
    assert_eq!(body["data"]["status"], "confirmed");

    let (status, _) = app.post(&checkin_uri, Some(&guest.token), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post(&checkin_uri, Some(&organizer.token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isCheckedIn"], true);

    let (status, _) = app.post(&checkin_uri, Some(&organizer.token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_duplicate_booking_cancel_and_rebook() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let stranger = app.register("stranger").await;
    let event = app.create_event(&organizer.token, 10, 0.0, true).await;
    let event_id = id_of(&event);

    let (_, body) = app.book(&guest.token, &event_id, 4).await;
    let booking_id = id_of(&body["data"]);
    let (status, _) = app.book(&guest.token, &event_id, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.current_attendees(&event_id).await, 4);

    let cancel_uri = format!("/api/Bookings/{}/cancel", booking_id);
    let (status, _) = app.post(&cancel_uri, Some(&stranger.token), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&cancel_uri, Some(&guest.token), json!({ "reason": "plans changed" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(body["data"]["cancellationReason"], "plans changed");
    assert_eq!(app.current_attendees(&event_id).await, 0);

    let (status, _) = app.send(Method::POST, &cancel_uri, Some(&guest.token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.book(&guest.token, &event_id, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(app.current_attendees(&event_id).await, 2);
}

#[tokio::test]
async fn test_cancelled_event_rejects_bookings_and_notifies_holders() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let late = app.register("late").await;
    let event = app.create_event(&organizer.token, 10, 0.0, true).await;
    let event_id = id_of(&event);
    app.book(&guest.token, &event_id, 1).await;

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/Event/{}/status", event_id),
            Some(&organizer.token),
            Some(json!({ "status": "cancelled" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");

    let (status, _) = app.book(&late.token, &event_id, 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/api/Notifications", Some(&guest.token)).await;
    let kinds: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"eventCancelled"));
    assert!(kinds.contains(&"bookingConfirmed"));
}

#[tokio::test]
async fn test_venue_in_use_is_deactivated_instead_of_deleted() {
    let app = TestApp::new();
    let admin = app.admin("admin").await;
    let organizer = app.register("organizer").await;

    let venue_body = json!({ "name": "Main Hall", "address": "1 Main St", "city": "Abuja", "capacity": 200 });
    let (status, body) = app.post("/api/Venues", Some(&admin.token), venue_body.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let used_venue = id_of(&body["data"]);
    let (_, body) = app.post("/api/Venues", Some(&admin.token), venue_body).await;
    let unused_venue = id_of(&body["data"]);

    let event_body = |venue: &str| {
        json!({
            "title": "Concert",
            "startDate": "2031-06-01T18:00:00Z",
            "endDate": "2031-06-01T23:00:00Z",
            "location": "Main Hall",
            "venueId": venue,
            "maxAttendees": 150,
            "category": "Music",
            "ticketPrice": 10.0,
        })
    };
    app.create_event_with(&organizer.token, event_body(&used_venue)).await;

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/Venues/{}", used_venue), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "deactivated");

    let (status, body) = app
        .send(Method::DELETE, &format!("/api/Venues/{}", unused_venue), Some(&admin.token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (_, body) = app.get("/api/Venues", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    let (_, body) = app.get("/api/Venues?includeInactive=true", Some(&admin.token)).await;
    assert_eq!(body["data"][0]["isActive"], false);

    let (status, _) = app
        .post("/api/Event", Some(&organizer.token), event_body(&used_venue))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_tokens_rotate_and_logout_revokes() {
    let app = TestApp::new();
    let session = app.register("rotor").await;

    let (status, body) = app
        .post("/api/Auth/refresh", None, json!({ "refreshToken": session.refresh_token }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = session_from(&body);
    assert_ne!(rotated.refresh_token, session.refresh_token);
    assert_eq!(rotated.user_id, session.user_id);

    let (status, _) = app
        .post("/api/Auth/refresh", None, json!({ "refreshToken": session.refresh_token }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post("/api/Auth/logout", None, json!({ "refreshToken": rotated.refresh_token }))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .post("/api/Auth/refresh", None, json!({ "refreshToken": rotated.refresh_token }))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_event_registration_lifecycle() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let event = app.create_event(&organizer.token, 5, 20.0, false).await;
    let event_id = id_of(&event);

    let register = json!({ "eventId": event_id, "notes": "vegetarian" });
    let (status, body) = app.post("/api/EventAttendees", Some(&guest.token), register.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let attendee_id = id_of(&body["data"]);
    assert_eq!(body["data"]["status"], "registered");
    assert_eq!(body["data"]["paymentRequired"], true);
    assert_eq!(app.current_attendees(&event_id).await, 1);

    let (status, _) = app.post("/api/EventAttendees", Some(&guest.token), register.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(&format!("/api/EventAttendees/{}/payment", attendee_id), Some(&guest.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["paymentCompleted"], true);

    let (status, _) = app
        .post(&format!("/api/EventAttendees/{}/cancel", attendee_id), Some(&guest.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.current_attendees(&event_id).await, 0);

    let (status, body) = app.post("/api/EventAttendees", Some(&guest.token), register).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(id_of(&body["data"]), attendee_id);

    let (status, body) = app
        .post(&format!("/api/EventAttendees/{}/checkin", attendee_id), Some(&organizer.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "checkedIn");

    let (_, body) = app
        .get(&format!("/api/Event/{}/attendees", event_id), Some(&organizer.token))
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (status, _) = app
        .get(&format!("/api/Event/{}/attendees", event_id), Some(&guest.token))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_private_events_are_hidden_from_other_users() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let other = app.register("other").await;
    let event = app
        .create_event_with(
            &organizer.token,
            json!({
                "title": "Board meeting",
                "startDate": "2031-01-10T09:00:00Z",
                "endDate": "2031-01-10T10:00:00Z",
                "location": "Room 4",
                "maxAttendees": 8,
                "category": "Business",
                "isFree": true,
                "isPublic": false,
            }),
        )
        .await;
    let uri = format!("/api/Event/{}", id_of(&event));

    let (status, _) = app.get(&uri, Some(&other.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.get(&uri, Some(&organizer.token)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.get("/api/Event", None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
    let (_, body) = app.get("/api/Event/mine", Some(&organizer.token)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_event_update_cannot_shrink_below_taken_seats() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let event = app.create_event(&organizer.token, 10, 0.0, true).await;
    let event_id = id_of(&event);
    app.book(&guest.token, &event_id, 6).await;

    let mut update = json!({
        "title": "Rust Meetup (moved)",
        "startDate": "2031-05-02T18:00:00Z",
        "endDate": "2031-05-02T21:00:00Z",
        "location": "Library",
        "maxAttendees": 5,
        "category": "Tech",
        "isFree": true,
    });
    let uri = format!("/api/Event/{}", event_id);
    let (status, _) = app.send(Method::PUT, &uri, Some(&organizer.token), Some(update.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(Method::PUT, &uri, Some(&guest.token), Some(update.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    update["maxAttendees"] = json!(6);
    let (status, body) = app.send(Method::PUT, &uri, Some(&organizer.token), Some(update)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["maxAttendees"], 6);
    assert_eq!(body["data"]["currentAttendees"], 6);
    assert_eq!(body["data"]["location"], "Library");
}

#[tokio::test]
async fn test_search_requires_a_term_or_filter() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    app.create_event(&organizer.token, 10, 0.0, true).await;

    let (status, body) = app.get("/api/Search", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = app.get("/api/Search?q=meetup", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["events"].as_array().unwrap().len(), 1);
    assert!(body["data"]["venues"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/api/Search?q=opera", None).await;
    assert!(body["data"]["events"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/api/Search?category=tech", None).await;
    assert_eq!(body["data"]["events"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_notifications_are_private_and_can_be_read() {
    let app = TestApp::new();
    let organizer = app.register("organizer").await;
    let guest = app.register("guest").await;
    let event = app.create_event(&organizer.token, 10, 0.0, true).await;
    app.book(&guest.token, &id_of(&event), 1).await;

    let (_, body) = app.get("/api/Notifications/unread-count", Some(&guest.token)).await;
    assert_eq!(body["data"]["unread"], 1);

    let (_, body) = app.get("/api/Notifications", Some(&guest.token)).await;
    let notification_id = id_of(&body["data"][0]);

    let read_uri = format!("/api/Notifications/{}/read", notification_id);
    let (status, _) = app.send(Method::PATCH, &read_uri, Some(&organizer.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app.send(Method::PATCH, &read_uri, Some(&guest.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isRead"], true);

    let (_, body) = app.get("/api/Notifications?unreadOnly=true", Some(&guest.token)).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_sees_audit_trail() {
    let app = TestApp::new();
    let admin = app.admin("admin").await;
    let organizer = app.register("organizer").await;
    let event = app.create_event(&organizer.token, 10, 0.0, true).await;
    let event_id = id_of(&event);

    let (status, body) = app
        .get(
            &format!("/api/AuditLogs?entityName=Event&entityId={}", event_id),
            Some(&admin.token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "create");
    assert_eq!(entries[0]["userId"].as_str().unwrap(), organizer.user_id.to_string());
}
