//! Credential persistence for the Waypost client.
//!
//! This crate provides:
//! - the [`SecureStorage`] key/value trait the client persists through
//! - [`CredentialVault`], the load/save/clear API over that trait
//! - two backends: [`MemoryStorage`] and [`FileStorage`]

mod file;
mod keys;
mod memory;
mod traits;
mod vault;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;
pub use vault::{CredentialMeta, CredentialVault, StoredCredential};

use std::path::PathBuf;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific storage error
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a vault backed by a JSON file at `path`.
pub fn create_file_vault(path: impl Into<PathBuf>) -> StorageResult<CredentialVault> {
    let storage = FileStorage::new(path)?;
    Ok(CredentialVault::new(Box::new(storage)))
}

/// Create a vault that keeps credentials in memory only.
pub fn create_memory_vault() -> CredentialVault {
    CredentialVault::new(Box::new(MemoryStorage::new()))
}
