//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Bearer access token
    pub const ACCESS_TOKEN: &'static str = "access_token";

    /// Renewal (refresh) token
    pub const REFRESH_TOKEN: &'static str = "refresh_token";

    /// Credential metadata: expiry and identity (JSON)
    pub const CREDENTIAL_META: &'static str = "credential_meta";
}
