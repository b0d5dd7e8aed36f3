//! Credential store: lookup of identity records by key.
//!
//! The core only reads from the store, so any backend that can answer
//! "which record belongs to this key" fits behind [`CredentialStore`]. The
//! bundled [`InMemoryCredentialStore`] is populated once at startup, either
//! from a JSON users file or with the demo identity.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fmt, fs, path::Path};
use tracing::{debug, info};

use super::password::PasswordVerifier;

pub const DEMO_IDENTITY_KEY: &str = "demo@fintech.com";
pub const DEMO_DISPLAY_NAME: &str = "Demo User";
pub const DEMO_PASSWORD: &str = "demopassword";

/// Stored user record. Never mutated by the core.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    pub identity_key: String,
    pub display_name: String,
    pub password_hash: String,
}

impl Identity {
    #[must_use]
    pub fn new(identity_key: String, display_name: String, password_hash: String) -> Self {
        Self {
            identity_key,
            display_name,
            password_hash,
        }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("identity_key", &self.identity_key)
            .field("display_name", &self.display_name)
            .field("password_hash", &"***")
            .finish()
    }
}

/// Read-only lookup capability consumed by the session facade.
pub trait CredentialStore: Send + Sync {
    fn find(&self, identity_key: &str) -> Option<Identity>;
}

/// Users file entry. Holds a bcrypt hash, never a plaintext password.
#[derive(Deserialize, Debug)]
struct UserEntry {
    email: String,
    name: String,
    password_hash: String,
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: HashMap<String, Identity>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record. Keys are normalized like lookups.
    pub fn insert(&mut self, identity: Identity) {
        let key = normalize_key(&identity.identity_key);
        self.records.insert(key, identity);
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.insert(identity);
        self
    }

    /// Add the demo identity, hashing its password with the given verifier.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn with_demo_identity(mut self, verifier: &PasswordVerifier) -> Result<Self> {
        let hash = verifier
            .hash(DEMO_PASSWORD)
            .context("Failed to hash demo password")?;
        self.insert(Identity::new(
            DEMO_IDENTITY_KEY.to_string(),
            DEMO_DISPLAY_NAME.to_string(),
            hash,
        ));
        info!("Demo identity {DEMO_IDENTITY_KEY} enabled");
        Ok(self)
    }

    /// Load records from a JSON array of `{email, name, password_hash}`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn with_users_file(mut self, path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read users file: {}", path.display()))?;
        let entries: Vec<UserEntry> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid users file: {}", path.display()))?;
        let count = entries.len();
        for entry in entries {
            debug!(identity = %entry.email, "loaded identity");
            self.insert(Identity::new(entry.email, entry.name, entry.password_hash));
        }
        info!("Loaded {count} identities from {}", path.display());
        Ok(self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn find(&self, identity_key: &str) -> Option<Identity> {
        self.records.get(&normalize_key(identity_key)).cloned()
    }
}

/// Normalize an identity key (email) for lookups.
#[must_use]
pub fn normalize_key(identity_key: &str) -> String {
    identity_key.trim().to_lowercase()
}
