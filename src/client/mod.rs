//! Client-side site context for a long-lived session.
//!
//! [`SiteRegistry`] holds the user's sites and the selected one, mirrors the
//! selection into the session cookie the server reads, and notifies
//! subscribers when the bound site changes.

pub mod directory;
pub mod error;
pub mod notifier;
pub mod persist;
pub mod pointer;
pub mod registry;

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

pub use directory::{HttpSiteDirectory, SiteDirectory};
pub use error::SiteError;
pub use notifier::{SiteChangeSubscription, SiteChanges, SiteNotifier};
pub use persist::SelectionFile;
pub use pointer::{CookiePointer, MemoryPointer, SessionPointer};
pub use registry::{SiteRegistry, UsePermission};

use crate::config::{ConfigError, DEFAULT_MAX_OWNED_SITES, DEFAULT_SESSION_COOKIE};

/// One year.
pub const DEFAULT_COOKIE_MAX_AGE_SECONDS: i64 = 31_536_000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: Url,
    /// Bearer token issued by the identity provider.
    pub token: String,
    pub max_owned_sites: u32,
    pub cookie_name: String,
    pub cookie_max_age_seconds: i64,
    /// Where the last selection is kept between runs. Not persisted if unset.
    pub state_path: Option<PathBuf>,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: Url, token: impl Into<String>) -> Self {
        Self {
            api_url,
            token: token.into(),
            max_owned_sites: DEFAULT_MAX_OWNED_SITES,
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            cookie_max_age_seconds: DEFAULT_COOKIE_MAX_AGE_SECONDS,
            state_path: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_url = env::var("SITES_API_URL")
            .unwrap_or_else(|_| "http://localhost:8080".to_string());
        let api_url = Url::parse(&api_url)
            .map_err(|_| ConfigError::InvalidValue("SITES_API_URL".to_string()))?;
        let token = env::var("SITES_API_TOKEN")
            .map_err(|_| ConfigError::MissingEnv("SITES_API_TOKEN".to_string()))?;

        let mut config = Self::new(api_url, token);

        if let Ok(raw) = env::var("SITES_MAX_OWNED") {
            config.max_owned_sites = raw
                .parse()
                .ok()
                .filter(|max| *max > 0)
                .ok_or_else(|| ConfigError::InvalidValue("SITES_MAX_OWNED".to_string()))?;
        }
        if let Ok(name) = env::var("SESSION_COOKIE_NAME") {
            config.cookie_name = name;
        }
        if let Ok(raw) = env::var("SESSION_COOKIE_MAX_AGE_SECONDS") {
            config.cookie_max_age_seconds = raw.parse().map_err(|_| {
                ConfigError::InvalidValue("SESSION_COOKIE_MAX_AGE_SECONDS".to_string())
            })?;
        }
        config.state_path = env::var("SITES_STATE_PATH").ok().map(PathBuf::from);
        if let Ok(raw) = env::var("SITES_REQUEST_TIMEOUT_SECONDS") {
            let secs: u64 = raw.parse().map_err(|_| {
                ConfigError::InvalidValue("SITES_REQUEST_TIMEOUT_SECONDS".to_string())
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}

impl SiteRegistry {
    /// Registry talking to the HTTP API, with the selection mirrored into
    /// the client's cookie jar.
    pub fn connect(config: &ClientConfig) -> anyhow::Result<Self> {
        let jar = Arc::new(reqwest::cookie::Jar::default());
        let client = HttpSiteDirectory::build_client(jar.clone(), config.request_timeout)?;
        let directory = HttpSiteDirectory::new(client, config.api_url.clone(), config.token.clone());
        let pointer = CookiePointer::new(
            jar,
            directory.base_url().clone(),
            config.cookie_name.clone(),
            config.cookie_max_age_seconds,
        );

        let registry = SiteRegistry::new(
            Arc::new(directory),
            Arc::new(pointer),
            config.max_owned_sites,
        );
        Ok(match &config.state_path {
            Some(path) => registry.with_persistence(SelectionFile::new(path)),
            None => registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_uses_defaults() {
        let config = ClientConfig::new(Url::parse("http://localhost:8080").unwrap(), "t");
        assert_eq!(config.max_owned_sites, 2);
        assert_eq!(config.cookie_name, "current_site_id");
        assert_eq!(config.cookie_max_age_seconds, 31_536_000);
        assert!(config.state_path.is_none());
    }

    #[test]
    fn connect_builds_an_unbound_registry() {
        let config = ClientConfig::new(Url::parse("http://localhost:8080").unwrap(), "t");
        let registry = SiteRegistry::connect(&config).unwrap();
        assert_eq!(registry.current_site_id(), None);
        assert_eq!(registry.max_owned_sites(), 2);
    }
}
