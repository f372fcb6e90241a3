//! Authentication module for the YouTube Data API
//!
//! Keeps a single OAuth2 credential on disk, refreshes it when it expires,
//! and runs the authorization-code flow when there is nothing to refresh.

pub mod error;
pub mod manager;
pub mod oauth;
pub mod store;
pub mod tokens;

pub use error::AuthError;
pub use manager::{CredentialStatus, TokenLifecycleManager, TokenRefresher};
pub use oauth::{login, refresh, status, OAuthClient};
pub use store::TokenStore;
pub use tokens::Credential;

pub const GOOGLE_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const YOUTUBE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/youtube.readonly";

/// OAuth2 client registration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth2 client ID of the registered application
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub auth_uri: String,
    /// Token endpoint used for code exchange and refresh
    pub token_uri: String,
    /// Where the provider sends the user back with `?code=`
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl AuthConfig {
    /// Google endpoints with read-only YouTube access. Client credentials
    /// come from configuration.
    pub fn google() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            auth_uri: GOOGLE_AUTH_URI.to_string(),
            token_uri: GOOGLE_TOKEN_URI.to_string(),
            redirect_uri: "http://127.0.0.1:8000/callback".to_string(),
            scopes: vec![YOUTUBE_READONLY_SCOPE.to_string()],
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::google()
    }
}
