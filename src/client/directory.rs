use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use super::error::SiteError;
use crate::db::models::{PageName, SiteWithRole};
use crate::permissions::Permission;

/// The client's view of the membership directory and site lifecycle.
#[async_trait]
pub trait SiteDirectory: Send + Sync {
    /// Active memberships of the signed-in user, oldest site first.
    async fn list_sites(&self) -> Result<Vec<SiteWithRole>, SiteError>;
    async fn create_site(&self, name: &str) -> Result<SiteWithRole, SiteError>;
    async fn delete_site(&self, site_id: &str) -> Result<(), SiteError>;
    async fn leave_site(&self, site_id: &str) -> Result<(), SiteError>;
    async fn page_permission(&self, site_id: &str, page: PageName) -> Result<Permission, SiteError>;
}

/// [`SiteDirectory`] backed by the HTTP API.
///
/// The `reqwest` client should carry the cookie jar the session pointer
/// writes into, so the server sees the selection on every request.
#[derive(Clone)]
pub struct HttpSiteDirectory {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl HttpSiteDirectory {
    pub fn new(client: reqwest::Client, mut base_url: Url, token: impl Into<String>) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            client,
            base_url,
            token: token.into(),
        }
    }

    /// Client with a request timeout; transport timeouts surface as
    /// `DataUnavailable`.
    pub fn build_client(
        jar: std::sync::Arc<reqwest::cookie::Jar>,
        timeout: Duration,
    ) -> Result<reqwest::Client, SiteError> {
        Ok(reqwest::Client::builder()
            .cookie_provider(jar)
            .timeout(timeout)
            .build()?)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, SiteError> {
        self.base_url
            .join(path)
            .map_err(|e| SiteError::DataUnavailable(format!("Invalid API URL: {}", e)))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SiteError> {
        let resp = request.bearer_auth(&self.token).send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.json::<ErrorEnvelope>().await.ok().map(|e| e.error);
        let err = classify(status, body);
        tracing::debug!(%status, "Site API request failed: {}", err);
        Err(err)
    }
}

/// Map an API error response onto the client taxonomy.
fn classify(status: StatusCode, body: Option<ErrorBody>) -> SiteError {
    let code = body.as_ref().map(|b| b.code.as_str()).unwrap_or_default();
    match (status, code) {
        (StatusCode::UNAUTHORIZED, _) | (_, "UNAUTHORIZED") | (_, "INVALID_TOKEN") => {
            SiteError::NotAuthenticated
        }
        (_, "SITE_LIMIT_REACHED") => {
            let max = body
                .as_ref()
                .and_then(|b| b.details.as_ref())
                .and_then(|d| d.get("max"))
                .and_then(|m| m.as_u64())
                .and_then(|m| u32::try_from(m).ok())
                .unwrap_or_default();
            SiteError::SiteLimitReached(max)
        }
        (_, "NOT_OWNER") => SiteError::NotOwner,
        (StatusCode::NOT_FOUND, _) => SiteError::UnknownSite,
        _ => SiteError::DataUnavailable(
            body.map(|b| b.message)
                .unwrap_or_else(|| format!("Unexpected response status {}", status)),
        ),
    }
}

#[async_trait]
impl SiteDirectory for HttpSiteDirectory {
    async fn list_sites(&self) -> Result<Vec<SiteWithRole>, SiteError> {
        let resp = self.send(self.client.get(self.url("api/sites")?)).await?;
        Ok(resp.json().await?)
    }

    async fn create_site(&self, name: &str) -> Result<SiteWithRole, SiteError> {
        let resp = self
            .send(
                self.client
                    .post(self.url("api/sites")?)
                    .json(&serde_json::json!({ "name": name })),
            )
            .await?;
        Ok(resp.json().await?)
    }

    async fn delete_site(&self, site_id: &str) -> Result<(), SiteError> {
        let url = self.url(&format!("api/sites/{}", site_id))?;
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    async fn leave_site(&self, site_id: &str) -> Result<(), SiteError> {
        let url = self.url(&format!("api/sites/{}/leave", site_id))?;
        self.send(self.client.post(url)).await?;
        Ok(())
    }

    async fn page_permission(&self, site_id: &str, page: PageName) -> Result<Permission, SiteError> {
        let mut url = self.url(&format!("api/permissions/{}", page.as_str()))?;
        url.query_pairs_mut().append_pair("site_id", site_id);
        let resp = self.send(self.client.get(url)).await?;
        Ok(resp.json().await?)
    }
}
