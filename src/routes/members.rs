use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use serde::Deserialize;

use crate::db::models::{AccessLevel, PageName, PagePermission};
use crate::error::{AppError, AppResult};
use crate::routes::auth::AuthUser;
use crate::services::members::{MemberService, MemberView};
use crate::AppState;

/// Mounted under `/api/sites`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/:site_id/members", get(list_members))
        .route("/:site_id/members/:membership_id", delete(remove_member))
        .route(
            "/:site_id/members/:membership_id/permissions/:page",
            put(set_permission),
        )
}

#[derive(Debug, Deserialize)]
pub struct SetPermissionRequest {
    pub access_level: AccessLevel,
}

pub(crate) fn parse_page(page: &str) -> AppResult<PageName> {
    PageName::try_from(page).map_err(AppError::BadRequest)
}

async fn list_members(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(site_id): Path<String>,
) -> AppResult<Json<Vec<MemberView>>> {
    Ok(Json(MemberService::list(&state, &user.id, &site_id).await?))
}

async fn set_permission(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((site_id, membership_id, page)): Path<(String, String, String)>,
    Json(body): Json<SetPermissionRequest>,
) -> AppResult<Json<PagePermission>> {
    let page = parse_page(&page)?;
    let row = MemberService::set_permission(
        &state,
        &user.id,
        &site_id,
        &membership_id,
        page,
        body.access_level,
    )
    .await?;
    Ok(Json(row))
}

async fn remove_member(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((site_id, membership_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    MemberService::remove(&state, &user.id, &site_id, &membership_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
