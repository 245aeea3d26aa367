use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};

use crate::db::models::{CreateInvitation, SiteInvitation};
use crate::error::AppResult;
use crate::routes::auth::AuthUser;
use crate::services::invitations::{AcceptedInvitation, InvitationService};
use crate::AppState;

/// Management endpoints, mounted under `/api/sites`.
pub fn site_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/:site_id/invitations",
            get(list_invitations).post(create_invitation),
        )
        .route(
            "/:site_id/invitations/:invitation_id",
            delete(revoke_invitation),
        )
}

/// Public code redemption, mounted under `/api/invitations` behind the rate
/// limiter.
pub fn accept_router() -> Router<Arc<AppState>> {
    Router::new().route("/:code/accept", post(accept_invitation))
}

async fn list_invitations(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(site_id): Path<String>,
) -> AppResult<Json<Vec<SiteInvitation>>> {
    Ok(Json(InvitationService::list(&state, &user.id, &site_id).await?))
}

async fn create_invitation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(site_id): Path<String>,
    Json(body): Json<CreateInvitation>,
) -> AppResult<(StatusCode, Json<SiteInvitation>)> {
    let invitation = InvitationService::create(&state, &user.id, &site_id, body).await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

async fn revoke_invitation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path((site_id, invitation_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    InvitationService::revoke(&state, &user.id, &site_id, &invitation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(code): Path<String>,
) -> AppResult<Json<AcceptedInvitation>> {
    Ok(Json(InvitationService::accept(&state, &user.id, &code).await?))
}
