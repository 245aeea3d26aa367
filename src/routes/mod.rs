use std::sync::Arc;

use axum::{routing::get, Router};

use crate::AppState;

pub mod auth;
pub mod health;
pub mod invitations;
pub mod members;
pub mod permissions;
pub mod sites;

/// Every route except invitation acceptance, which the binary mounts at
/// `/api/invitations` behind its own rate limiter.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/auth", auth::router())
        .nest("/api/sites", sites::router())
        .nest("/api/permissions", permissions::router())
}
