//! Secret lookup for the Blue Iris login.
//!
//! A lookup either finds a secret or reports that none is stored; "not found"
//! is never an error at this layer; the caller decides whether absence is
//! fatal. Secret values are wrapped in [`Secret`] so that they cannot end up
//! in log output by accident.

use crate::config::CredentialRef;
use crate::error::CredentialError;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque secret string with a redacted `Debug`/`Display`
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new<S: Into<String>>(value: S) -> Self {
        Self(value.into())
    }

    /// Access the secret value. Never pass the result to a logging macro.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// Backing store for secrets, keyed by service and account
pub trait CredentialStore: Send + Sync {
    fn get_secret(&self, service: &str, account: &str) -> Result<Option<Secret>, CredentialError>;
}

/// OS keyring: Keychain, Credential Manager, or on Linux the Secret Service
/// with a kernel keyutils cache in front of it. Entries written by other
/// Secret Service clients under the same service and account are found, and
/// they survive reboots.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl CredentialStore for KeyringStore {
    fn get_secret(&self, service: &str, account: &str) -> Result<Option<Secret>, CredentialError> {
        let entry = keyring::Entry::new(service, account).map_err(|e| CredentialError::Store {
            message: e.to_string(),
        })?;

        match entry.get_password() {
            Ok(password) => Ok(Some(Secret::new(password))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(CredentialError::Store {
                message: e.to_string(),
            }),
        }
    }
}

/// In-memory store, for tests and embedding
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    secrets: HashMap<(String, String), Secret>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_secret(mut self, service: &str, account: &str, secret: &str) -> Self {
        self.secrets.insert(
            (service.to_string(), account.to_string()),
            Secret::new(secret),
        );
        self
    }
}

impl CredentialStore for MemoryStore {
    fn get_secret(&self, service: &str, account: &str) -> Result<Option<Secret>, CredentialError> {
        Ok(self
            .secrets
            .get(&(service.to_string(), account.to_string()))
            .cloned())
    }
}

/// Resolves the configured credential reference against a store
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn CredentialStore>,
}

impl CredentialResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Look up a secret; `Ok(None)` when nothing is stored for the account
    pub fn resolve(&self, credential: &CredentialRef) -> Result<Option<Secret>, CredentialError> {
        debug!(
            service = %credential.service,
            account = %credential.account,
            "Looking up credential"
        );
        self.store
            .get_secret(&credential.service, &credential.account)
    }

    /// Like [`resolve`](Self::resolve), but absence is a [`CredentialError::NotFound`]
    pub fn require(&self, credential: &CredentialRef) -> Result<Secret, CredentialError> {
        self.resolve(credential)?
            .ok_or_else(|| CredentialError::NotFound {
                service: credential.service.clone(),
                account: credential.account.clone(),
            })
    }
}

impl Default for CredentialResolver {
    fn default() -> Self {
        Self::new(Arc::new(KeyringStore))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(account: &str) -> CredentialRef {
        CredentialRef {
            service: "blueiris".to_string(),
            account: account.to_string(),
        }
    }

    #[test]
    fn test_resolve_present_and_absent() {
        let resolver = CredentialResolver::new(Arc::new(
            MemoryStore::new().with_secret("blueiris", "admin", "hunter2"),
        ));

        let secret = resolver.resolve(&credential("admin")).unwrap();
        assert_eq!(secret.as_ref().map(Secret::expose), Some("hunter2"));

        assert!(resolver.resolve(&credential("guest")).unwrap().is_none());
    }

    #[test]
    fn test_require_reports_not_found() {
        let resolver = CredentialResolver::new(Arc::new(MemoryStore::new()));

        match resolver.require(&credential("admin")) {
            Err(CredentialError::NotFound { service, account }) => {
                assert_eq!(service, "blueiris");
                assert_eq!(account, "admin");
            }
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_keyring_unknown_entry_is_never_a_secret() {
        // Either no entry, or a store error on hosts without a keyring daemon
        let result = KeyringStore.get_secret("camping-test", "no-such-account");
        assert!(!matches!(result, Ok(Some(_))));
    }

    #[test]
    fn test_secret_is_redacted() {
        let secret = Secret::new("hunter2");
        assert!(!format!("{:?}", secret).contains("hunter2"));
        assert!(!format!("{}", secret).contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }
}
