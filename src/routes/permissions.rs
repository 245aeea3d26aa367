use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::error::AppResult;
use crate::permissions::Permission;
use crate::routes::auth::AuthUser;
use crate::routes::members::parse_page;
use crate::routes::sites::session_pointer;
use crate::services::permissions::PermissionResolver;
use crate::services::site_resolver::{SiteResolution, SiteResolver};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/:page", get(resolve_permission))
}

#[derive(Debug, Deserialize)]
pub struct PermissionQuery {
    /// Resolve for this site instead of the cookie-bound one.
    pub site_id: Option<String>,
}

/// Site id from the cookie, the way `CurrentSite` binds it. Lookup failures
/// leave the request unbound, which resolves to `close`.
async fn bound_site_id(jar: &CookieJar, state: &AppState, user_id: &str) -> Option<String> {
    let pointer = session_pointer(jar, state);
    match SiteResolver::resolve_current_site(&state.db, Some(user_id), pointer.as_deref()).await {
        Ok(SiteResolution::Resolved(site)) => Some(site.site.id),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(user_id, "Could not bind request to a site: {:?}", e);
            None
        }
    }
}

async fn resolve_permission(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(page): Path<String>,
    Query(query): Query<PermissionQuery>,
    jar: CookieJar,
) -> AppResult<Json<Permission>> {
    let page = parse_page(&page)?;

    let site_id = match query.site_id {
        Some(id) => Some(id),
        None => bound_site_id(&jar, &state, &user.id).await,
    };

    Ok(Json(
        PermissionResolver::resolve(&state.db, &user.id, site_id.as_deref(), page).await,
    ))
}
