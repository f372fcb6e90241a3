//! Credential record and its on-disk representation

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthError;

/// The access/refresh token bundle plus the provider metadata needed to
/// refresh it.
///
/// `expires_at` is always held in UTC. Records written by older versions
/// with naive timestamps are read as UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "CredentialRecord", into = "CredentialRecord")]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_uri: String,
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// A credential is valid only with a known expiry strictly after `now`.
    /// Without `expires_at` validity cannot be confirmed, so it is not valid.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now,
            None => false,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

/// Persisted JSON layout.
#[derive(Debug, Serialize, Deserialize)]
struct CredentialRecord {
    token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    token_uri: String,
    client_id: String,
    client_secret: String,
    #[serde(default)]
    scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

impl TryFrom<CredentialRecord> for Credential {
    type Error = AuthError;

    fn try_from(record: CredentialRecord) -> Result<Self, Self::Error> {
        if record.token.trim().is_empty() {
            return Err(AuthError::InvalidCredential("empty access token".into()));
        }
        let expires_at = record
            .expires_at
            .as_deref()
            .map(parse_expiry)
            .transpose()?;
        Ok(Self {
            access_token: record.token,
            refresh_token: record.refresh_token.filter(|t| !t.is_empty()),
            token_uri: record.token_uri,
            client_id: record.client_id,
            client_secret: record.client_secret,
            scopes: record.scopes,
            expires_at,
        })
    }
}

impl From<Credential> for CredentialRecord {
    fn from(credential: Credential) -> Self {
        Self {
            token: credential.access_token,
            refresh_token: credential.refresh_token,
            token_uri: credential.token_uri,
            client_id: credential.client_id,
            client_secret: credential.client_secret,
            scopes: credential.scopes,
            expires_at: credential
                .expires_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
        }
    }
}

/// Parse an ISO-8601 expiry. Offsets are converted to UTC; naive values are
/// taken as UTC.
pub fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, AuthError> {
    let raw = raw.trim();
    if let Ok(aware) = DateTime::parse_from_rfc3339(raw) {
        return Ok(aware.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|e| AuthError::InvalidCredential(format!("bad expires_at {raw:?}: {e}")))
}
