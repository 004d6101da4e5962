//! Passwords for the `iposApi` credential, kept in the OS keychain.
//!
//! Entries are keyed by the login email under the credential's name, so one
//! machine can hold passwords for several IPos accounts.

use anyhow::{Context, Result};
use keyring::Entry;

use ipos_core::auth::CREDENTIAL_NAME;
use ipos_core::Credentials;

pub struct Keychain;

impl Keychain {
    fn entry(email: &str) -> Result<Entry> {
        Entry::new(CREDENTIAL_NAME, email).context("Failed to open keychain entry")
    }

    /// Password saved for `email`, or `None` when the keychain has none.
    pub fn password(email: &str) -> Result<Option<String>> {
        found(Self::entry(email)?.get_password())
            .context("Failed to read password from keychain")
    }

    /// Save the password of a login that just succeeded.
    pub fn save(credentials: &Credentials) -> Result<()> {
        Self::entry(&credentials.identity)?
            .set_password(&credentials.secret)
            .context("Failed to store password in keychain")
    }

    /// Remove the saved password. Returns `false` when nothing was stored.
    pub fn forget(email: &str) -> Result<bool> {
        let removed = found(Self::entry(email)?.delete_credential())
            .context("Failed to delete password from keychain")?;
        Ok(removed.is_some())
    }
}

/// A missing entry is an answer, not a failure.
fn found<T>(result: keyring::Result<T>) -> keyring::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(e),
    }
}
