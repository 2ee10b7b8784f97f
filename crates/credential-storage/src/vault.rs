//! High-level API for persisting the session credential.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Credential metadata stored next to the tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialMeta {
    /// When the access token expires, if known
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    /// User object returned by the backend with the credential
    #[serde(default)]
    pub identity: Option<serde_json::Value>,
}

/// A credential as persisted between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCredential {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub meta: CredentialMeta,
}

/// Persists the current credential through a [`SecureStorage`] backend.
pub struct CredentialVault {
    storage: Box<dyn SecureStorage>,
}

impl CredentialVault {
    /// Create a new vault with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Load the persisted credential.
    ///
    /// Returns `Ok(None)` when no access token is stored. Missing or
    /// corrupt metadata yields a credential with empty metadata rather than
    /// an error; the access token alone is still usable.
    pub fn load_credential(&self) -> StorageResult<Option<StoredCredential>> {
        let Some(access_token) = self.storage.get(StorageKeys::ACCESS_TOKEN)? else {
            return Ok(None);
        };
        let refresh_token = self.storage.get(StorageKeys::REFRESH_TOKEN)?;

        let meta = match self.storage.get(StorageKeys::CREDENTIAL_META)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Discarding unreadable credential metadata");
                CredentialMeta::default()
            }),
            None => CredentialMeta::default(),
        };

        Ok(Some(StoredCredential {
            access_token,
            refresh_token,
            meta,
        }))
    }

    /// Persist a credential, replacing whatever was stored.
    pub fn save_credential(&self, credential: &StoredCredential) -> StorageResult<()> {
        let meta = serde_json::to_string(&credential.meta)
            .map_err(|e| StorageError::Encoding(e.to_string()))?;

        self.storage
            .set(StorageKeys::ACCESS_TOKEN, &credential.access_token)?;
        match &credential.refresh_token {
            Some(token) => self.storage.set(StorageKeys::REFRESH_TOKEN, token)?,
            None => {
                self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
            }
        }
        self.storage.set(StorageKeys::CREDENTIAL_META, &meta)?;

        tracing::debug!(
            has_refresh_token = credential.refresh_token.is_some(),
            "Credential persisted"
        );
        Ok(())
    }

    /// Remove every persisted credential key.
    pub fn clear_credential(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::ACCESS_TOKEN)?;
        self.storage.delete(StorageKeys::REFRESH_TOKEN)?;
        self.storage.delete(StorageKeys::CREDENTIAL_META)?;
        tracing::debug!("Credential cleared from storage");
        Ok(())
    }

    /// Whether an access token is persisted.
    pub fn has_credential(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::ACCESS_TOKEN)
    }
}
