use std::env;

use serde::Deserialize;

/// Owned-site cap used when `SITES_MAX_OWNED` is not set.
pub const DEFAULT_MAX_OWNED_SITES: u32 = 2;

/// Cookie carrying the current-site pointer.
pub const DEFAULT_SESSION_COOKIE: &str = "current_site_id";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub sites: SitesConfig,
    pub session: SessionConfig,
    pub rate_limit: RateLimitConfig,
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret shared with the identity provider that signs access tokens.
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SitesConfig {
    /// Maximum number of sites a single user may own.
    pub max_owned: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Cookie the client writes the current-site pointer into. Read from
    /// env var `SESSION_COOKIE_NAME`.
    pub cookie_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for invite acceptance
    pub invite_per_second: u32,
    /// Burst size for invite acceptance
    pub invite_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Whether the orphan/invitation maintenance worker runs.
    pub enabled: bool,
    /// Seconds between maintenance passes.
    pub interval_seconds: u64,
}

fn parse_flag(name: &str) -> Option<bool> {
    match env::var(name) {
        Ok(v) => match v.to_lowercase().as_str() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        },
        Err(_) => None,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let max_owned = env::var("SITES_MAX_OWNED")
            .unwrap_or_else(|_| DEFAULT_MAX_OWNED_SITES.to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("SITES_MAX_OWNED".to_string()))?;
        if max_owned == 0 {
            return Err(ConfigError::InvalidValue("SITES_MAX_OWNED".to_string()));
        }

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/sites.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
            },
            sites: SitesConfig { max_owned },
            session: SessionConfig {
                cookie_name: env::var("SESSION_COOKIE_NAME")
                    .unwrap_or_else(|_| DEFAULT_SESSION_COOKIE.to_string()),
            },
            rate_limit: RateLimitConfig {
                invite_per_second: env::var("RATE_LIMIT_INVITE_PER_SECOND")
                    .unwrap_or_else(|_| "1".to_string())
                    .parse()
                    .unwrap_or(1),
                invite_burst: env::var("RATE_LIMIT_INVITE_BURST")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            maintenance: MaintenanceConfig {
                enabled: parse_flag("MAINTENANCE_ENABLED").unwrap_or(true),
                interval_seconds: env::var("MAINTENANCE_INTERVAL_SECONDS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600u64),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/sites.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
            },
            sites: SitesConfig {
                max_owned: DEFAULT_MAX_OWNED_SITES,
            },
            session: SessionConfig {
                cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            },
            rate_limit: RateLimitConfig {
                invite_per_second: 1,
                invite_burst: 5,
            },
            maintenance: MaintenanceConfig {
                enabled: true,
                interval_seconds: 3600,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.sites.max_owned, 2);
        assert_eq!(config.session.cookie_name, "current_site_id");
    }
}
