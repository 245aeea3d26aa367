//! Multi-site household membership: which site a request or session is bound
//! to, and what the user may do on each page of it.
//!
//! The server side (`routes`, `services`, `db`) owns durable storage and
//! resolves the current site per request from the session cookie. The
//! `client` module keeps a long-lived session's site list and selection and
//! mirrors the selection into that cookie.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod permissions;
pub mod routes;
pub mod services;

use config::Config;

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
}
