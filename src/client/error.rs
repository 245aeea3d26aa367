/// Errors a client session surfaces to its UI.
///
/// Cloneable so the registry can keep the last one around until the UI
/// dismisses it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SiteError {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Site limit reached: you can own at most {0} sites")]
    SiteLimitReached(u32),

    #[error("Only the site owner can do this")]
    NotOwner,

    #[error("Site data is unavailable: {0}")]
    DataUnavailable(String),

    #[error("You are not a member of this site")]
    UnknownSite,
}

impl From<reqwest::Error> for SiteError {
    fn from(e: reqwest::Error) -> Self {
        SiteError::DataUnavailable(e.to_string())
    }
}
