use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::get,
    Json, Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use serde::Serialize;

use crate::db::User;
use crate::error::{AppError, AppResult};
use crate::services::auth::AuthService;
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(me))
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
}

/// Current principal as mirrored locally.
async fn me(AuthUser(user): AuthUser) -> AppResult<Json<UserResponse>> {
    Ok(Json(UserResponse {
        id: user.id,
        email: user.email,
    }))
}

// ============================================================================
// Auth Middleware / Extractor
// ============================================================================

/// Extractor for authenticated user
pub struct AuthUser(pub User);

/// Resolve the bearer token, if any. `Ok(None)` means no credentials were sent.
pub(crate) async fn authenticate(parts: &Parts, state: &AppState) -> AppResult<Option<User>> {
    let Some(Authorization(bearer)) = parts.headers.typed_get::<Authorization<Bearer>>() else {
        tracing::debug!("Missing or invalid Authorization header");
        return Ok(None);
    };

    let token = bearer.token().trim();
    if token.is_empty() {
        tracing::debug!("Empty bearer token in Authorization header");
        return Ok(None);
    }

    let user = AuthService::user_from_token(&state.db, &state.config.jwt.secret, token)
        .await
        .map_err(|e| {
            tracing::debug!("Failed to get user from token: {:?}", e);
            e
        })?;

    tracing::debug!("Authenticated user: {}", user.id);
    Ok(Some(user))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
            .await?
            .map(AuthUser)
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::test_support::{bearer_for, body_json, request, test_app};
    use axum::body::Body;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn me_returns_the_token_principal() {
        let (app, state) = test_app().await;

        let resp = app
            .clone()
            .oneshot(request("GET", "/api/auth/me", None, None, Body::empty()))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .oneshot(request(
                "GET",
                "/api/auth/me",
                Some(&bearer_for(&state, "alice")),
                None,
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["id"], "alice");
        assert_eq!(json["email"], "alice@example.com");
    }
}
