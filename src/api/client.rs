//! Authenticated HTTP client for the YouTube Data API
//!
//! Wraps reqwest::Client with a usable credential from the lifecycle
//! manager on every request.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;

use crate::auth::{AuthError, TokenLifecycleManager};
use crate::models::ListResponse;

/// How a request is authorized
enum Authorization {
    Bearer(String),
    ApiKey(String),
}

#[derive(Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    manager: Arc<TokenLifecycleManager>,
    api_key: Option<String>,
}

impl YouTubeClient {
    pub fn new(
        manager: Arc<TokenLifecycleManager>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            manager,
            api_key,
        }
    }

    /// Prefer the user's credential. Without one, fall back to the API key
    /// (public data only); a failed refresh is still reported.
    async fn authorization(&self) -> Result<Authorization> {
        match self.manager.usable_credential().await {
            Ok(credential) => Ok(Authorization::Bearer(credential.access_token)),
            Err(AuthError::ReauthenticationRequired) => match &self.api_key {
                Some(key) => {
                    tracing::debug!("No credential, using API key");
                    Ok(Authorization::ApiKey(key.clone()))
                }
                None => Err(AuthError::ReauthenticationRequired.into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// GET `{base}/{resource}` with the given query parameters.
    pub async fn get(&self, resource: &str, query: &[(&str, String)]) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, resource);
        tracing::debug!("YouTube GET {} {:?}", url, query);

        let request = self.http.get(&url).query(query);
        let request = match self.authorization().await? {
            Authorization::Bearer(token) => request.bearer_auth(token),
            Authorization::ApiKey(key) => request.query(&[("key", key)]),
        };

        let resp = request
            .send()
            .await
            .with_context(|| format!("YouTube GET {} failed", url))?;

        check_response(resp, &url).await
    }

    /// GET a `list` endpoint and decode its envelope.
    pub async fn list<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, String)],
    ) -> Result<ListResponse<T>> {
        self.get(resource, query)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", resource))
    }
}

/// Check HTTP response status code and return a clear error on failure.
async fn check_response(resp: reqwest::Response, url: &str) -> Result<reqwest::Response> {
    let status = resp.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        // Looked valid locally, so it was revoked upstream
        return Err(anyhow::Error::new(AuthError::ReauthenticationRequired).context(format!(
            "401 Unauthorized for {}. Token may be revoked -- run 'tubekey login'.",
            url
        )));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        bail!("HTTP {} for {}: {}", status.as_u16(), url, body);
    }
    Ok(resp)
}
