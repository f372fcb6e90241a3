//! Typed authentication errors
//!
//! Expired or missing credentials are not errors at the store level; they
//! surface here only once a caller actually needs a usable token.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The backing file could not be written. The previous record is kept.
    #[error("failed to write credential to {path}: {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No credential, or an expired one without a refresh token.
    #[error("re-authentication required")]
    ReauthenticationRequired,

    /// The provider rejected the refresh or could not be reached in time.
    #[error("token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// A credential record failed validation.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    #[error("OAuth client misconfigured: {0}")]
    Config(String),
}

impl AuthError {
    /// True when the user has to go through the consent flow again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            AuthError::ReauthenticationRequired | AuthError::TokenRefreshFailed(_)
        )
    }
}
