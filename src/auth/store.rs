//! Credential storage: an in-memory slot backed by a JSON file
//!
//! The cache is authoritative once populated; the file is the source of
//! truth on cold start. A missing, unreadable or corrupt file simply means
//! "no credential".

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::error::AuthError;
use super::tokens::Credential;

/// Owns the single tracked credential.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    cache: Mutex<Option<Credential>>,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `credential`, replacing any previous record.
    ///
    /// The file is written to a sibling temp file and renamed into place, so
    /// readers see either the old record or the new one. The cache is only
    /// updated once the write has landed.
    pub fn save(&self, credential: &Credential) -> Result<(), AuthError> {
        self.write_backing_file(credential)
            .map_err(|source| AuthError::StorageWrite {
                path: self.path.clone(),
                source,
            })?;
        *self.cache.lock() = Some(credential.clone());
        tracing::info!("Credential saved to {}", self.path.display());
        Ok(())
    }

    /// Return a credential that is usable right now, if there is one.
    pub fn load(&self) -> Option<Credential> {
        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Some(cached.clone());
                }
                tracing::debug!("Cached credential expired, checking backing file");
            }
        }

        let credential = self.read_backing_file()?;
        if credential.is_valid() {
            *self.cache.lock() = Some(credential.clone());
            Some(credential)
        } else {
            tracing::warn!("Stored credential is expired or has no expiry");
            None
        }
    }

    /// Return the latest known record regardless of validity.
    ///
    /// Used to find the refresh token of an expired credential. Never hands
    /// the record out as usable and never populates the cache.
    pub fn load_any(&self) -> Option<Credential> {
        if let Some(cached) = self.cache.lock().clone() {
            return Some(cached);
        }
        self.read_backing_file()
    }

    fn read_backing_file(&self) -> Option<Credential> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No credential file at {}", self.path.display());
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::error!(
                    "Invalid credential file {}: {}. Re-authentication is required.",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn write_backing_file(&self, credential: &Credential) -> io::Result<()> {
        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let content = serde_json::to_vec_pretty(credential).map_err(io::Error::other)?;

        // Unique per writer; removed on drop if the rename never happens.
        // Created with mode 0600 on unix.
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
