use axum::extract::State;
use axum::response::Response;

use crate::auth::AdminUser;
use crate::models::audit_log::AuditQuery;
use crate::state::AppState;
use crate::store::AuditRepo;
use crate::utils::error::Result;
use crate::utils::extract::AppQuery;
use crate::utils::response::success;

pub async fn list_audit_logs(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(query): AppQuery<AuditQuery>,
) -> Result<Response> {
    let entries = state.store.list_audit(&query).await?;
    Ok(success(entries, "Audit log retrieved"))
}
