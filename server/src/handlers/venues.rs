use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use super::record_audit;
use crate::auth::{AdminUser, AuthUser};
use crate::models::venue::{VenueQuery, VenueRemoval, VenueRequest};
use crate::models::{AuditAction, AuditLog};
use crate::state::AppState;
use crate::store::VenueRepo;
use crate::utils::error::{AppError, Result};
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::response::{created, no_content, success};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RemovalPayload {
    id: Uuid,
    outcome: VenueRemoval,
}

pub async fn list_venues(
    State(state): State<AppState>,
    caller: Option<AuthUser>,
    AppQuery(query): AppQuery<VenueQuery>,
) -> Result<Response> {
    let include_inactive =
        query.include_inactive && caller.as_ref().is_some_and(AuthUser::is_admin);
    let venues = state.store.list_venues(include_inactive).await?;
    Ok(success(venues, "Venues retrieved"))
}

pub async fn get_venue(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let venue = state
        .store
        .get_venue(id)
        .await?
        .ok_or_else(|| AppError::not_found("Venue", id))?;
    Ok(success(venue, "Venue retrieved"))
}

pub async fn create_venue(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(request): AppJson<VenueRequest>,
) -> Result<Response> {
    request.check()?;
    let venue = state.store.create_venue(request.into_venue(Utc::now())).await?;
    tracing::info!(venue_id = %venue.id, "Venue created");
    record_audit(
        &state,
        AuditLog::new("Venue", venue.id, AuditAction::Create, Some(admin.id)),
    )
    .await;
    Ok(created(venue, "Venue created"))
}

pub async fn update_venue(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<VenueRequest>,
) -> Result<Response> {
    request.check()?;
    let venue = state.store.update_venue(id, request, Utc::now()).await?;
    tracing::info!(venue_id = %venue.id, "Venue updated");
    record_audit(
        &state,
        AuditLog::new("Venue", venue.id, AuditAction::Update, Some(admin.id)),
    )
    .await;
    Ok(success(venue, "Venue updated"))
}

/// A venue still referenced by events is deactivated instead of removed.
/// A hard delete answers 204, a deactivation 200 with the outcome.
pub async fn delete_venue(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let outcome = state.store.remove_venue(id, Utc::now()).await?;
    tracing::info!(venue_id = %id, outcome = ?outcome, "Venue removed");
    record_audit(
        &state,
        AuditLog::new("Venue", id, AuditAction::Delete, Some(admin.id))
            .with_details(format!("{:?}", outcome)),
    )
    .await;

    match outcome {
        VenueRemoval::Deleted => Ok(no_content()),
        VenueRemoval::Deactivated => Ok(success(
            RemovalPayload { id, outcome },
            "Venue is referenced by events and was deactivated",
        )),
    }
}
