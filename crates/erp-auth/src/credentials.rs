//! Stored session credentials
//!
//! Manages a JSON file holding the current access/refresh token pair. All
//! writes use atomic temp-file + rename to prevent corruption on crash. A
//! tokio Mutex serializes concurrent writers (login, renewal, logout).
//!
//! Invariant: the pair is written and cleared as a unit. A partial pair is
//! never persisted by this store; an empty string counts as an absent token
//! on read.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The current session's bearer tokens.
///
/// Both values are opaque strings minted by the backend. The client never
/// parses or validates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Bearer token attached to authenticated requests
    pub access_token: String,
    /// Token used to obtain a new pair when the access token expires
    pub refresh_token: String,
}

/// File-backed store for the session token pair.
///
/// The Mutex serializes all access. Reads clone the small in-memory state,
/// so callers never hold the lock across a network call.
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<Option<TokenPair>>,
}

impl CredentialStore {
    /// Load the session from the given file path.
    ///
    /// If the file doesn't exist, creates it with an empty session so future
    /// loads don't need the cold-start path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading session file: {e}")))?;
            let pair: Option<TokenPair> = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing session file: {e}")))?;
            info!(path = %path.display(), session = pair.is_some(), "loaded session file");
            pair
        } else {
            info!(path = %path.display(), "session file not found, starting without a session");
            write_atomic(&path, &None).await?;
            None
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Current access token, if one is stored and non-empty.
    pub async fn access(&self) -> Option<String> {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|pair| pair.access_token.clone())
            .filter(|token| !token.is_empty())
    }

    /// Current refresh token, if one is stored and non-empty.
    pub async fn refresh_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(|pair| pair.refresh_token.clone())
            .filter(|token| !token.is_empty())
    }

    /// Whether any usable token is stored.
    pub async fn has_session(&self) -> bool {
        let state = self.state.lock().await;
        state
            .as_ref()
            .is_some_and(|pair| !pair.access_token.is_empty() || !pair.refresh_token.is_empty())
    }

    /// Replace the stored pair and persist to disk.
    ///
    /// Called on login and on every successful renewal. The in-memory state
    /// is updated before the disk write, so a failed write leaves the
    /// running process with the new tokens.
    pub async fn set_pair(&self, access: &str, refresh: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = Some(TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        });
        debug!("stored new token pair");
        write_atomic(&self.path, &state).await
    }

    /// Drop both tokens and persist the empty session.
    ///
    /// Called on logout, on renewal failure, and on a 401 that survived a
    /// retry. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = None;
        debug!("cleared stored token pair");
        write_atomic(&self.path, &state).await
    }
}

/// Write the session to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. Sets file permissions to 0600 since the file contains bearer
/// tokens.
async fn write_atomic(path: &Path, state: &Option<TokenPair>) -> Result<()> {
    let json = serde_json::to_string_pretty(state)
        .map_err(|e| Error::CredentialParse(format!("serializing session: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("session path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting session file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp session file: {e}")))?;

    debug!(path = %path.display(), "persisted session");
    Ok(())
}
