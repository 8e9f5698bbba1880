use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use uuid::Uuid;

use super::{ensure_event_manager, load_event, record_audit};
use crate::auth::AuthUser;
use crate::models::menu::{MenuAssignRequest, MenuQuery, MenuRequest};
use crate::models::{AuditAction, AuditLog, Menu};
use crate::state::AppState;
use crate::store::MenuRepo;
use crate::utils::error::{AppError, Result};
use crate::utils::extract::{AppJson, AppPath, AppQuery};
use crate::utils::response::{created, no_content, success};

/// Unassigned catalog items belong to admins. Items attached to an event may
/// also be managed by that event's creator.
async fn ensure_menu_access(
    state: &AppState,
    caller: &AuthUser,
    event_id: Option<Uuid>,
) -> Result<()> {
    if caller.is_admin() {
        if let Some(event_id) = event_id {
            load_event(state, event_id).await?;
        }
        return Ok(());
    }
    match event_id {
        Some(event_id) => {
            let event = load_event(state, event_id).await?;
            ensure_event_manager(caller, &event)
        }
        None => Err(AppError::Forbidden(
            "Only administrators manage catalog menus".to_string(),
        )),
    }
}

async fn load_menu(state: &AppState, id: Uuid) -> Result<Menu> {
    state
        .store
        .get_menu(id)
        .await?
        .ok_or_else(|| AppError::not_found("Menu", id))
}

pub async fn list_menus(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<MenuQuery>,
) -> Result<Response> {
    let menus = state.store.list_menus(&query).await?;
    Ok(success(menus, "Menus retrieved"))
}

pub async fn get_menu(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let menu = load_menu(&state, id).await?;
    Ok(success(menu, "Menu retrieved"))
}

pub async fn create_menu(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(request): AppJson<MenuRequest>,
) -> Result<Response> {
    request.check()?;
    ensure_menu_access(&state, &caller, request.event_id).await?;

    let menu = state.store.create_menu(request.into_menu(Utc::now())).await?;
    tracing::info!(menu_id = %menu.id, event_id = ?menu.event_id, "Menu created");
    record_audit(
        &state,
        AuditLog::new("Menu", menu.id, AuditAction::Create, Some(caller.id)),
    )
    .await;
    Ok(created(menu, "Menu created"))
}

pub async fn update_menu(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<MenuRequest>,
) -> Result<Response> {
    request.check()?;
    let existing = load_menu(&state, id).await?;
    ensure_menu_access(&state, &caller, existing.event_id).await?;
    if request.event_id != existing.event_id {
        ensure_menu_access(&state, &caller, request.event_id).await?;
    }

    let menu = state.store.update_menu(id, request, Utc::now()).await?;
    tracing::info!(menu_id = %menu.id, "Menu updated");
    record_audit(
        &state,
        AuditLog::new("Menu", menu.id, AuditAction::Update, Some(caller.id)),
    )
    .await;
    Ok(success(menu, "Menu updated"))
}

pub async fn assign_menu(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(request): AppJson<MenuAssignRequest>,
) -> Result<Response> {
    let existing = load_menu(&state, id).await?;
    match request.event_id {
        Some(target) => ensure_menu_access(&state, &caller, Some(target)).await?,
        // Unassigning releases the item from its current event.
        None => ensure_menu_access(&state, &caller, existing.event_id).await?,
    }

    let menu = state
        .store
        .assign_menu(id, request.event_id, Utc::now())
        .await?;
    tracing::info!(menu_id = %menu.id, event_id = ?menu.event_id, "Menu assignment changed");
    record_audit(
        &state,
        AuditLog::new("Menu", menu.id, AuditAction::Update, Some(caller.id))
            .with_details(match menu.event_id {
                Some(event_id) => format!("assigned to {}", event_id),
                None => "unassigned".to_string(),
            }),
    )
    .await;
    Ok(success(menu, "Menu assignment updated"))
}

pub async fn delete_menu(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<Response> {
    let existing = load_menu(&state, id).await?;
    ensure_menu_access(&state, &caller, existing.event_id).await?;

    if !state.store.delete_menu(id).await? {
        return Err(AppError::not_found("Menu", id));
    }
    tracing::info!(menu_id = %id, "Menu deleted");
    record_audit(
        &state,
        AuditLog::new("Menu", id, AuditAction::Delete, Some(caller.id)),
    )
    .await;
    Ok(no_content())
}
