use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::db::models::{Site, SiteWithRole, UpdateSite};
use crate::error::{AppError, AppErrorWithDetails, AppResult};
use crate::routes::auth::{authenticate, AuthUser};
use crate::routes::{invitations, members};
use crate::services::site_resolver::{SiteResolution, SiteResolver};
use crate::services::sites::SiteService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_sites).post(create_site))
        .route("/current", get(current_site))
        .route("/:site_id", axum::routing::patch(update_site).delete(delete_site))
        .route("/:site_id/leave", post(leave_site))
        .merge(members::router())
        .merge(invitations::site_router())
}

// ============================================================================
// Current-site extractor
// ============================================================================

/// Site the request is bound to, resolved from the session cookie.
///
/// Every site-scoped handler takes this instead of trusting a site id from
/// the client.
#[derive(Debug, Clone)]
pub struct CurrentSite(pub SiteWithRole);

/// Read the current-site pointer from the request cookies.
pub(crate) fn session_pointer(jar: &CookieJar, state: &AppState) -> Option<String> {
    jar.get(&state.config.session.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentSite {
    type Rejection = AppErrorWithDetails;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = authenticate(parts, state).await?;
        let pointer = session_pointer(&CookieJar::from_headers(&parts.headers), state);

        match SiteResolver::resolve_current_site(
            &state.db,
            user.as_ref().map(|u| u.id.as_str()),
            pointer.as_deref(),
        )
        .await?
        {
            SiteResolution::Resolved(site) => Ok(CurrentSite(site)),
            SiteResolution::NoSites => {
                Err(AppError::NoSites.with_details(serde_json::json!({ "redirect": "/onboarding" })))
            }
            SiteResolution::NotAuthenticated => {
                Err(AppError::Unauthorized.with_details(serde_json::json!({ "redirect": "/login" })))
            }
        }
    }
}

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateSiteRequest {
    pub name: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_sites(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> AppResult<Json<Vec<SiteWithRole>>> {
    Ok(Json(SiteService::list(&state, &user.id).await?))
}

async fn create_site(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateSiteRequest>,
) -> AppResult<(StatusCode, Json<SiteWithRole>)> {
    let site = SiteService::create(&state, &user.id, &body.name).await?;
    Ok((StatusCode::CREATED, Json(site)))
}

async fn current_site(CurrentSite(site): CurrentSite) -> Json<SiteWithRole> {
    Json(site)
}

async fn update_site(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(site_id): Path<String>,
    Json(body): Json<UpdateSite>,
) -> AppResult<Json<Site>> {
    Ok(Json(SiteService::update(&state, &user.id, &site_id, body).await?))
}

async fn delete_site(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(site_id): Path<String>,
) -> AppResult<StatusCode> {
    SiteService::delete(&state, &user.id, &site_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn leave_site(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(site_id): Path<String>,
) -> AppResult<StatusCode> {
    SiteService::leave(&state, &user.id, &site_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
