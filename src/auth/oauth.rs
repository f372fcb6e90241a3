//! OAuth2 authorization-code flow and token refresh against Google

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use oauth2::basic::{BasicClient, BasicErrorResponseType, BasicTokenResponse};
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, RefreshToken,
    RequestTokenError, Scope, TokenResponse, TokenUrl,
};
use oauth2::url::Url;

use super::manager::{CredentialStatus, RefreshedToken, TokenLifecycleManager, TokenRefresher};
use super::{AuthConfig, AuthError, Credential};

/// The external OAuth capability: consent URL, code exchange, refresh.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: AuthConfig,
}

impl OAuthClient {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn client_credentials(&self) -> Result<(&str, &str), AuthError> {
        let client_id = self
            .config
            .client_id
            .as_deref()
            .ok_or_else(|| AuthError::Config("CLIENT_ID is not set".into()))?;
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .ok_or_else(|| AuthError::Config("CLIENT_SECRET is not set".into()))?;
        Ok((client_id, client_secret))
    }

    /// Build the OAuth2 client used for the consent flow
    fn consent_client(&self) -> Result<BasicClient> {
        let (client_id, client_secret) = self.client_credentials()?;
        let redirect = RedirectUrl::new(self.config.redirect_uri.clone())
            .context("Invalid redirect URI")?;
        Ok(build_client(
            client_id,
            client_secret,
            &self.config.auth_uri,
            &self.config.token_uri,
        )?
        .set_redirect_uri(redirect))
    }

    /// Consent URL requesting offline access, plus the CSRF state to expect
    /// back on the callback.
    pub fn authorize_url(&self) -> Result<(Url, CsrfToken)> {
        let client = self.consent_client()?;
        let (url, state) = client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(self.config.scopes.iter().cloned().map(Scope::new))
            .add_extra_param("access_type", "offline")
            .add_extra_param("prompt", "consent")
            .url();
        tracing::info!("Generated authentication URL: {}", url);
        Ok((url, state))
    }

    /// Exchange an authorization code for a fresh credential.
    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let (client_id, client_secret) = self.client_credentials()?;
        let client = self.consent_client()?;

        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .context("Failed to exchange authorization code")?;

        if token_response.refresh_token().is_none() {
            tracing::warn!("Provider returned no refresh token; re-login will be needed on expiry");
        }

        Ok(Credential {
            access_token: token_response.access_token().secret().to_string(),
            refresh_token: token_response
                .refresh_token()
                .map(|t| t.secret().to_string()),
            token_uri: self.config.token_uri.clone(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scopes: granted_scopes(&token_response).unwrap_or_else(|| self.config.scopes.clone()),
            expires_at: expires_at(&token_response),
        })
    }
}

#[async_trait]
impl TokenRefresher for OAuthClient {
    async fn refresh(
        &self,
        token_uri: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<RefreshedToken> {
        let client = build_client(client_id, client_secret, &self.config.auth_uri, token_uri)?;

        tracing::debug!("Refreshing access token at {}", token_uri);

        let token_response = match client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(async_http_client)
            .await
        {
            Ok(token_response) => token_response,
            Err(RequestTokenError::ServerResponse(ref resp))
                if matches!(resp.error(), BasicErrorResponseType::InvalidGrant) =>
            {
                tracing::warn!("Refresh token rejected as invalid grant");
                anyhow::bail!("refresh token revoked or expired (invalid_grant)");
            }
            Err(e) => return Err(e).context("Failed to refresh access token"),
        };

        Ok(RefreshedToken {
            access_token: token_response.access_token().secret().to_string(),
            expires_at: expires_at(&token_response),
            refresh_token: token_response
                .refresh_token()
                .map(|t| t.secret().to_string()),
        })
    }
}

fn build_client(
    client_id: &str,
    client_secret: &str,
    auth_uri: &str,
    token_uri: &str,
) -> Result<BasicClient> {
    let auth_url = AuthUrl::new(auth_uri.to_string()).context("Invalid authorization URI")?;
    let token_url = TokenUrl::new(token_uri.to_string()).context("Invalid token URI")?;
    Ok(BasicClient::new(
        ClientId::new(client_id.to_string()),
        Some(ClientSecret::new(client_secret.to_string())),
        auth_url,
        Some(token_url),
    ))
}

fn expires_at(token: &BasicTokenResponse) -> Option<chrono::DateTime<Utc>> {
    token
        .expires_in()
        .and_then(|d| chrono::Duration::from_std(d).ok())
        .map(|d| Utc::now() + d)
}

fn granted_scopes(token: &BasicTokenResponse) -> Option<Vec<String>> {
    token
        .scopes()
        .map(|scopes| scopes.iter().map(|s| s.to_string()).collect())
}

/// Run the login flow from the command line.
///
/// Without a code, prints the consent URL (and tries to open it); the
/// provider then redirects to the running server's `/callback`. With a code
/// pasted from the redirect, exchanges it here.
pub async fn login(
    oauth: &OAuthClient,
    manager: &TokenLifecycleManager,
    code: Option<&str>,
) -> Result<()> {
    let Some(code) = code else {
        let (url, _state) = oauth.authorize_url()?;
        println!("\nOpen this URL to authorize access:\n\n  {}\n", url);
        if let Err(e) = webbrowser::open(url.as_str()) {
            tracing::debug!("Could not open browser: {}", e);
        }
        println!(
            "The provider redirects to {}.\n\
             Keep 'tubekey serve' running to receive it, or rerun with: tubekey login --code <CODE>",
            oauth.config().redirect_uri
        );
        return Ok(());
    };

    let credential = oauth.exchange_code(code.trim()).await?;
    manager.store_exchanged(&credential).await?;
    println!("Authentication successful.");
    if let Some(exp) = credential.expires_at {
        println!("  expires_at: {}", exp);
    }
    Ok(())
}

/// Display current auth status
pub fn status(manager: &TokenLifecycleManager) {
    match manager.status() {
        CredentialStatus::Valid { expires_at } => {
            println!("Token:       valid");
            println!("  expires_at: {}", expires_at);
        }
        CredentialStatus::Expired { refreshable } => {
            println!("Token:       expired");
            if refreshable {
                println!("Refresh tok: present");
            } else {
                println!("Refresh tok: none (run 'tubekey login')");
            }
        }
        CredentialStatus::Absent => {
            println!("Token:       none (run 'tubekey login')");
        }
    }
    println!("Token file:  {}", manager.store().path().display());
}

/// Make sure a usable token is on disk, refreshing an expired one.
pub async fn refresh(manager: &TokenLifecycleManager) -> Result<()> {
    let credential = manager
        .usable_credential()
        .await
        .context("Could not obtain a usable token")?;
    println!("Token valid.");
    if let Some(exp) = credential.expires_at {
        println!("  expires_at: {}", exp);
    }
    Ok(())
}
