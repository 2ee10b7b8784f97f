//! The single source of truth for the current credential.
//!
//! State lives in memory behind a lock and is mirrored to a
//! [`CredentialVault`]. Persistence failures are logged and never surface
//! to callers: the in-memory session stays authoritative for this process.
//!
//! Vault writes happen after the state lock is released, so readers never
//! wait on disk. Writers hold `persist` across both steps, which keeps the
//! vault in the same order as memory.

use crate::credential::{Credential, Identity};
use chrono::Utc;
use credential_storage::{CredentialMeta, CredentialVault, StoredCredential};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

#[derive(Default)]
struct StoreState {
    credential: Option<Credential>,
    identity: Option<Identity>,
    /// Bumped on every replace and clear.
    generation: u64,
}

pub struct CredentialStore {
    state: RwLock<StoreState>,
    persist: Mutex<()>,
    vault: CredentialVault,
}

impl CredentialStore {
    /// Open a store over `vault`, restoring any persisted credential.
    pub fn new(vault: CredentialVault) -> Self {
        let restored = match vault.load_credential() {
            Ok(Some(stored)) => {
                debug!("Restored persisted credential");
                restore(stored)
            }
            Ok(None) => StoreState::default(),
            Err(e) => {
                warn!(error = %e, "Failed to load persisted credential, starting signed out");
                StoreState::default()
            }
        };

        Self {
            state: RwLock::new(restored),
            persist: Mutex::new(()),
            vault,
        }
    }

    pub fn current(&self) -> Option<Credential> {
        self.state.read().credential.clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.read().identity.clone()
    }

    /// Install a new credential. A `None` identity keeps the previous one.
    pub fn replace(&self, credential: Credential, identity: Option<Identity>) {
        let _persist = self.persist.lock();
        let stored = install(&mut self.state.write(), credential, identity);
        self.save(&stored);
    }

    /// Install a renewed credential unless the session changed since
    /// `generation` was observed. Returns whether it was installed.
    pub(crate) fn replace_if_unchanged(
        &self,
        generation: u64,
        credential: Credential,
        identity: Option<Identity>,
    ) -> bool {
        let _persist = self.persist.lock();
        let stored = {
            let mut state = self.state.write();
            if state.generation != generation {
                return false;
            }
            install(&mut state, credential, identity)
        };
        self.save(&stored);
        true
    }

    pub fn clear(&self) {
        let _persist = self.persist.lock();
        {
            let mut state = self.state.write();
            state.generation += 1;
            state.credential = None;
            state.identity = None;
        }

        if let Err(e) = self.vault.clear_credential() {
            warn!(error = %e, "Failed to clear persisted credential");
        }
    }

    fn save(&self, stored: &StoredCredential) {
        if let Err(e) = self.vault.save_credential(stored) {
            warn!(error = %e, "Failed to persist credential");
        }
    }

    /// Unknown or passed expiry counts as expired.
    pub fn is_expired(&self, credential: &Credential) -> bool {
        credential.is_expired_at(Utc::now())
    }

    /// Access token to attach to an outgoing request, if one is held and unexpired.
    pub fn usable_access_token(&self) -> Option<String> {
        let state = self.state.read();
        let credential = state.credential.as_ref()?;
        if self.is_expired(credential) {
            return None;
        }
        Some(credential.access_token().to_string())
    }

    /// Renewal token to present to the backend, if one is held and usable.
    pub fn renewal_token(&self) -> Option<String> {
        self.renewal_snapshot().map(|(token, _)| token)
    }

    /// The renewal token together with the generation it belongs to.
    pub(crate) fn renewal_snapshot(&self) -> Option<(String, u64)> {
        let state = self.state.read();
        let token = state
            .credential
            .as_ref()?
            .usable_refresh_token(Utc::now())?
            .to_string();
        Some((token, state.generation))
    }

    pub fn is_signed_in(&self) -> bool {
        self.state.read().credential.is_some()
    }
}

/// Swap `credential` into `state` and return its persisted form.
fn install(
    state: &mut StoreState,
    credential: Credential,
    identity: Option<Identity>,
) -> StoredCredential {
    state.generation += 1;
    if identity.is_some() {
        state.identity = identity;
    }

    let stored = StoredCredential {
        access_token: credential.access_token().to_string(),
        refresh_token: credential.refresh_token().map(str::to_string),
        meta: CredentialMeta {
            expires_at: credential.expires_at(),
            identity: state
                .identity
                .as_ref()
                .and_then(|identity| serde_json::to_value(identity).ok()),
        },
    };
    state.credential = Some(credential);
    stored
}

fn restore(stored: StoredCredential) -> StoreState {
    let identity = stored
        .meta
        .identity
        .and_then(|value| match serde_json::from_value(value) {
            Ok(identity) => Some(identity),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable persisted identity");
                None
            }
        });

    let credential = match stored.meta.expires_at {
        Some(expires_at) => Credential::from_parts(
            stored.access_token,
            stored.refresh_token,
            Some(expires_at),
        ),
        None => Credential::new(stored.access_token, stored.refresh_token),
    };

    StoreState {
        credential: Some(credential),
        identity,
        generation: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::test_tokens::jwt;
    use credential_storage::{
        create_file_vault, create_memory_vault, MemoryStorage, SecureStorage, StorageKeys,
        StorageResult,
    };
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    /// Memory storage whose first access-token write blocks until released.
    struct StallingStorage {
        inner: MemoryStorage,
        armed: AtomicBool,
        entered: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SecureStorage for StallingStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            if key == StorageKeys::ACCESS_TOKEN && self.armed.swap(false, Ordering::SeqCst) {
                let _ = self.entered.lock().send(());
                let _ = self.release.lock().recv_timeout(Duration::from_secs(5));
            }
            self.inner.set(key, value)
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            self.inner.get(key)
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            self.inner.delete(key)
        }
    }

    #[test]
    fn test_empty_store() {
        let store = CredentialStore::new(create_memory_vault());
        assert!(store.current().is_none());
        assert!(store.usable_access_token().is_none());
        assert!(store.renewal_token().is_none());
        assert!(!store.is_signed_in());
    }

    #[test]
    fn test_expired_access_token_is_not_usable() {
        let store = CredentialStore::new(create_memory_vault());
        store.replace(
            Credential::new(jwt("u1", -5), Some("r".to_string())),
            None,
        );
        assert!(store.is_signed_in());
        assert!(store.is_expired(&store.current().unwrap()));
        assert!(store.usable_access_token().is_none());
        assert_eq!(store.renewal_token().as_deref(), Some("r"));
    }

    #[test]
    fn test_replace_keeps_identity_when_absent() {
        let store = CredentialStore::new(create_memory_vault());
        let identity = Identity {
            email: Some("a@b.c".to_string()),
            ..Default::default()
        };
        store.replace(Credential::new(jwt("u1", 60), None), Some(identity.clone()));
        store.replace(Credential::new(jwt("u1", 120), None), None);
        assert_eq!(store.identity(), Some(identity));

        store.clear();
        assert!(store.identity().is_none());
        assert!(store.current().is_none());
    }

    #[test]
    fn test_replace_if_unchanged_detects_sign_out() {
        let store = CredentialStore::new(create_memory_vault());
        store.replace(Credential::new(jwt("u1", -5), Some("r".to_string())), None);
        let (_, generation) = store.renewal_snapshot().unwrap();

        store.clear();
        assert!(!store.replace_if_unchanged(generation, Credential::new(jwt("u1", 60), None), None));
        assert!(!store.is_signed_in());

        store.replace(Credential::new(jwt("u2", -5), Some("r2".to_string())), None);
        let (token, generation) = store.renewal_snapshot().unwrap();
        assert_eq!(token, "r2");
        assert!(store.replace_if_unchanged(generation, Credential::new(jwt("u2", 60), None), None));
        assert!(store.usable_access_token().is_some());
    }

    #[test]
    fn test_store_restores_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let token = jwt("u1", 3600);

        let store = CredentialStore::new(create_file_vault(&path).unwrap());
        store.replace(
            Credential::new(token.clone(), Some("refresh".to_string())),
            Some(Identity {
                id: Some("7".to_string()),
                ..Default::default()
            }),
        );

        let reopened = CredentialStore::new(create_file_vault(&path).unwrap());
        assert_eq!(reopened.usable_access_token(), Some(token));
        assert_eq!(reopened.renewal_token().as_deref(), Some("refresh"));
        assert_eq!(reopened.identity().unwrap().id.as_deref(), Some("7"));

        reopened.clear();
        let cleared = CredentialStore::new(create_file_vault(&path).unwrap());
        assert!(!cleared.is_signed_in());
    }

    #[test]
    fn test_readers_are_not_blocked_by_persistence() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let storage = StallingStorage {
            inner: MemoryStorage::new(),
            armed: AtomicBool::new(true),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        let store = Arc::new(CredentialStore::new(CredentialVault::new(Box::new(storage))));
        let token = jwt("u1", 3600);

        let writer = {
            let store = Arc::clone(&store);
            let token = token.clone();
            std::thread::spawn(move || store.replace(Credential::new(token, None), None))
        };

        entered_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("write reached the vault");
        // The vault write is still in progress
        assert_eq!(store.usable_access_token(), Some(token.clone()));
        assert!(store.is_signed_in());

        release_tx.send(()).unwrap();
        writer.join().unwrap();
        assert_eq!(
            store.vault.load_credential().unwrap().unwrap().access_token,
            token
        );
    }
}
