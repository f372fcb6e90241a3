//! Token lifecycle: validity checks, refresh, write-back
//!
//! Turns "some credential, possibly expired" into "a credential safe to use
//! right now" with at most one round trip to the provider's token endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::error::AuthError;
use super::store::TokenStore;
use super::tokens::Credential;

/// Default bound on a single refresh round trip.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful provider-side refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
    /// Providers often omit this and keep the old refresh token valid.
    pub refresh_token: Option<String>,
}

/// Exchanges a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(
        &self,
        token_uri: &str,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> anyhow::Result<RefreshedToken>;
}

/// Usability of the tracked credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialStatus {
    Absent,
    Valid { expires_at: DateTime<Utc> },
    Expired { refreshable: bool },
}

pub struct TokenLifecycleManager {
    store: Arc<TokenStore>,
    refresher: Arc<dyn TokenRefresher>,
    refresh_timeout: Duration,
    /// Serializes read-check-refresh-write so concurrent callers never race
    /// two refreshes with the same refresh token.
    gate: Mutex<()>,
}

impl TokenLifecycleManager {
    pub fn new(store: Arc<TokenStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            store,
            refresher,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            gate: Mutex::new(()),
        }
    }

    pub fn with_refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn is_valid(credential: &Credential) -> bool {
        credential.is_valid()
    }

    /// Return `credential` if still valid, otherwise refresh and persist it.
    ///
    /// On refresh failure nothing is written; the expired record stays on
    /// disk so callers can tell that a full login is needed.
    pub async fn ensure_fresh(&self, credential: Credential) -> Result<Credential, AuthError> {
        if Self::is_valid(&credential) {
            return Ok(credential);
        }

        let Some(refresh_token) = credential.refresh_token.clone() else {
            tracing::warn!("Credential expired and no refresh token available");
            return Err(AuthError::ReauthenticationRequired);
        };

        tracing::info!("Access token expired, refreshing...");
        let refreshed = tokio::time::timeout(
            self.refresh_timeout,
            self.refresher.refresh(
                &credential.token_uri,
                &credential.client_id,
                &credential.client_secret,
                &refresh_token,
            ),
        )
        .await
        .map_err(|_| {
            tracing::error!("Token refresh timed out after {:?}", self.refresh_timeout);
            AuthError::TokenRefreshFailed(format!("timed out after {:?}", self.refresh_timeout))
        })?
        .map_err(|e| {
            tracing::error!("Failed to refresh token: {:#}", e);
            AuthError::TokenRefreshFailed(format!("{:#}", e))
        })?;

        if refreshed.access_token.is_empty() {
            return Err(AuthError::TokenRefreshFailed(
                "provider returned an empty access token".into(),
            ));
        }
        // Without an expiry the renewed credential is never valid, so each
        // later call refreshes again and status reports it as expired. The
        // token is still handed to this caller.
        if refreshed.expires_at.is_none() {
            tracing::warn!("Provider did not report an expiry; token will be refreshed on next use");
        }

        let renewed = Credential {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or(Some(refresh_token)),
            expires_at: refreshed.expires_at,
            ..credential
        };
        self.store.save(&renewed)?;
        tracing::info!("Token refreshed successfully");
        Ok(renewed)
    }

    /// The credential request handlers should use, refreshing if needed.
    pub async fn usable_credential(&self) -> Result<Credential, AuthError> {
        let _guard = self.gate.lock().await;

        if let Some(credential) = self.store.load() {
            return Ok(credential);
        }
        match self.store.load_any() {
            Some(expired) => self.ensure_fresh(expired).await,
            None => {
                tracing::warn!("No credential stored, authentication required");
                Err(AuthError::ReauthenticationRequired)
            }
        }
    }

    /// Record a credential obtained from a completed authorization-code exchange.
    pub async fn store_exchanged(&self, credential: &Credential) -> Result<(), AuthError> {
        let _guard = self.gate.lock().await;
        self.store.save(credential)
    }

    pub fn status(&self) -> CredentialStatus {
        if let Some(credential) = self.store.load() {
            if let Some(expires_at) = credential.expires_at {
                return CredentialStatus::Valid { expires_at };
            }
        }
        match self.store.load_any() {
            Some(credential) => CredentialStatus::Expired {
                refreshable: credential.refresh_token.is_some(),
            },
            None => CredentialStatus::Absent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::TimeZone;
    use tempfile::TempDir;

    enum Outcome {
        Refreshed(RefreshedToken),
        Rejected,
        Hang,
    }

    struct FakeRefresher {
        outcome: Outcome,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FakeRefresher {
        fn new(outcome: Outcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn slow(outcome: Outcome, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenRefresher for FakeRefresher {
        async fn refresh(
            &self,
            _token_uri: &str,
            _client_id: &str,
            _client_secret: &str,
            refresh_token: &str,
        ) -> anyhow::Result<RefreshedToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match &self.outcome {
                Outcome::Refreshed(token) => {
                    assert_eq!(refresh_token, "R");
                    Ok(token.clone())
                }
                Outcome::Rejected => anyhow::bail!("invalid_grant"),
                Outcome::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!()
                }
            }
        }
    }

    fn future() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::hours(1)
    }

    fn expired_credential(refresh_token: Option<&str>) -> Credential {
        Credential {
            access_token: "A".into(),
            refresh_token: refresh_token.map(String::from),
            token_uri: "https://oauth2.example/token".into(),
            client_id: "id".into(),
            client_secret: "secret".into(),
            scopes: vec!["scope".into()],
            expires_at: Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()),
        }
    }

    fn new_b(refresh_token: Option<&str>) -> RefreshedToken {
        RefreshedToken {
            access_token: "B".into(),
            expires_at: Some(future()),
            refresh_token: refresh_token.map(String::from),
        }
    }

    fn manager(refresher: Arc<FakeRefresher>) -> (TempDir, TokenLifecycleManager) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(TokenStore::new(dir.path().join("token_info.json")));
        (dir, TokenLifecycleManager::new(store, refresher))
    }

    #[tokio::test]
    async fn test_valid_credential_returned_unchanged() {
        let refresher = FakeRefresher::new(Outcome::Rejected);
        let (_dir, mgr) = manager(refresher.clone());
        let valid = Credential {
            expires_at: Some(future()),
            ..expired_credential(Some("R"))
        };

        let result = mgr.ensure_fresh(valid.clone()).await.unwrap();
        assert_eq!(result, valid);
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(new_b(None)));
        let (_dir, mgr) = manager(refresher.clone());

        let result = mgr.ensure_fresh(expired_credential(Some("R"))).await.unwrap();
        assert_eq!(result.access_token, "B");
        assert_eq!(result.refresh_token.as_deref(), Some("R"));
        assert_eq!(result.client_id, "id");
        assert_eq!(result.scopes, vec!["scope".to_string()]);
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_adopts_rotated_refresh_token() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(new_b(Some("R2"))));
        let (_dir, mgr) = manager(refresher);

        let result = mgr.ensure_fresh(expired_credential(Some("R"))).await.unwrap();
        assert_eq!(result.refresh_token.as_deref(), Some("R2"));
        assert_eq!(mgr.store().load(), Some(result));
    }

    #[tokio::test]
    async fn test_no_refresh_token_requires_reauth() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(new_b(None)));
        let (_dir, mgr) = manager(refresher.clone());

        let err = mgr.ensure_fresh(expired_credential(None)).await.unwrap_err();
        assert!(matches!(err, AuthError::ReauthenticationRequired));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_provider_error_leaves_store_untouched() {
        let refresher = FakeRefresher::new(Outcome::Rejected);
        let (_dir, mgr) = manager(refresher.clone());
        let expired = expired_credential(Some("R"));
        mgr.store().save(&expired).unwrap();
        let before = fs::read(mgr.store().path()).unwrap();

        let err = mgr.usable_credential().await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRefreshFailed(_)));
        assert!(err.requires_login());
        assert_eq!(fs::read(mgr.store().path()).unwrap(), before);
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_refresh_timeout_is_failure() {
        let refresher = FakeRefresher::new(Outcome::Hang);
        let (_dir, mgr) = manager(refresher);
        let mgr = mgr.with_refresh_timeout(Duration::from_millis(50));

        let err = mgr.ensure_fresh(expired_credential(Some("R"))).await.unwrap_err();
        assert!(matches!(err, AuthError::TokenRefreshFailed(_)));
    }

    #[tokio::test]
    async fn test_expired_record_on_disk_is_refreshed_and_persisted() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(new_b(None)));
        let (_dir, mgr) = manager(refresher);
        fs::write(
            mgr.store().path(),
            r#"{"token":"A","refresh_token":"R","token_uri":"https://oauth2.example/token",
                "client_id":"id","client_secret":"secret","scopes":[],
                "expires_at":"2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let credential = mgr.usable_credential().await.unwrap();
        assert_eq!(credential.access_token, "B");

        let persisted: serde_json::Value =
            serde_json::from_slice(&fs::read(mgr.store().path()).unwrap()).unwrap();
        assert_eq!(persisted["token"], "B");
        assert_eq!(persisted["refresh_token"], "R");
        let expires_at = persisted["expires_at"].as_str().unwrap();
        assert!(expires_at.ends_with('Z'));
        assert!(crate::auth::tokens::parse_expiry(expires_at).unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn test_refresh_persist_failure_is_reported() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(new_b(Some("R2"))));
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = Arc::new(TokenStore::new(blocker.join("token_info.json")));
        let mgr = TokenLifecycleManager::new(store, refresher.clone());

        let err = mgr.ensure_fresh(expired_credential(Some("R"))).await.unwrap_err();
        assert!(matches!(err, AuthError::StorageWrite { .. }));
        assert!(!err.requires_login());
        assert_eq!(refresher.calls(), 1);
        assert_eq!(mgr.store().load_any(), None);
    }

    #[tokio::test]
    async fn test_refresh_without_expiry_refreshes_again() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(RefreshedToken {
            expires_at: None,
            ..new_b(None)
        }));
        let (_dir, mgr) = manager(refresher.clone());
        mgr.store().save(&expired_credential(Some("R"))).unwrap();

        let first = mgr.usable_credential().await.unwrap();
        assert_eq!(first.access_token, "B");
        assert_eq!(first.expires_at, None);
        assert_eq!(mgr.status(), CredentialStatus::Expired { refreshable: true });

        mgr.usable_credential().await.unwrap();
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test]
    async fn test_absent_credential_requires_reauth() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(new_b(None)));
        let (_dir, mgr) = manager(refresher.clone());

        assert_eq!(mgr.status(), CredentialStatus::Absent);
        let err = mgr.usable_credential().await.unwrap_err();
        assert!(matches!(err, AuthError::ReauthenticationRequired));
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_callers_refresh_once() {
        let refresher =
            FakeRefresher::slow(Outcome::Refreshed(new_b(None)), Duration::from_millis(50));
        let (_dir, mgr) = manager(refresher.clone());
        mgr.store().save(&expired_credential(Some("R"))).unwrap();
        let mgr = Arc::new(mgr);

        let (a, b) = tokio::join!(mgr.usable_credential(), mgr.usable_credential());
        assert_eq!(a.unwrap().access_token, "B");
        assert_eq!(b.unwrap().access_token, "B");
        assert_eq!(refresher.calls(), 1);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let refresher = FakeRefresher::new(Outcome::Refreshed(new_b(None)));
        let (_dir, mgr) = manager(refresher);

        mgr.store_exchanged(&expired_credential(Some("R"))).await.unwrap();
        assert_eq!(mgr.status(), CredentialStatus::Expired { refreshable: true });

        mgr.usable_credential().await.unwrap();
        assert!(matches!(mgr.status(), CredentialStatus::Valid { .. }));
    }
}
