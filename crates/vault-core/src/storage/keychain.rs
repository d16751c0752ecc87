//! OS Keychain passphrase store
//!
//! Uses the system keychain, which stays on this device:
//! - macOS: Keychain
//! - Windows: Credential Manager (DPAPI)
//! - Linux: Secret Service (GNOME Keyring, KWallet)

use keyring::Entry;
use tracing::{debug, warn};

use super::PassphraseStore;
use crate::crypto::SecretString;
use crate::error::{Result, VaultError};

/// Service name used for keychain entries
const SERVICE_NAME: &str = "account-vault";

/// OS Keychain passphrase store
pub struct KeychainPassphraseStore {
    /// Prefix for all entries (for namespacing)
    prefix: String,
    /// Whether keychain is available
    available: bool,
}

impl KeychainPassphraseStore {
    /// Create a new keychain store with optional prefix
    pub fn new(prefix: Option<&str>) -> Self {
        let prefix = prefix.map(|p| format!("{}-", p)).unwrap_or_default();

        let available = Self::test_availability();

        if available {
            debug!("Keychain passphrase store is available");
        } else {
            warn!(
                "Keychain passphrase store is not available - passphrases will not be remembered"
            );
        }

        Self { prefix, available }
    }

    /// Test if the keychain is available
    fn test_availability() -> bool {
        match Entry::new(SERVICE_NAME, "__test_availability__") {
            Ok(entry) => {
                if entry.set_password("test").is_ok() {
                    let _ = entry.delete_password();
                    true
                } else {
                    false
                }
            }
            Err(_) => false,
        }
    }

    /// Check if keychain is available
    pub fn is_available(&self) -> bool {
        self.available
    }

    fn entry(&self, owner_id: &str) -> Result<Entry> {
        if !self.available {
            return Err(VaultError::KeychainError(
                "Keychain not available".to_string(),
            ));
        }
        let account = format!("{}passphrase:{}", self.prefix, owner_id);
        Entry::new(SERVICE_NAME, &account).map_err(|e| VaultError::KeychainError(e.to_string()))
    }
}

impl PassphraseStore for KeychainPassphraseStore {
    fn save(&self, owner_id: &str, passphrase: &SecretString) -> Result<()> {
        self.entry(owner_id)?
            .set_password(passphrase.expose())
            .map_err(|e| VaultError::KeychainError(e.to_string()))?;

        debug!("Remembered passphrase in keychain for owner {}", owner_id);
        Ok(())
    }

    fn load(&self, owner_id: &str) -> Result<Option<SecretString>> {
        match self.entry(owner_id)?.get_password() {
            Ok(passphrase) => Ok(Some(SecretString::new(passphrase))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::KeychainError(e.to_string())),
        }
    }

    fn forget(&self, owner_id: &str) -> Result<()> {
        match self.entry(owner_id)?.delete_password() {
            Ok(()) => {
                debug!("Forgot keychain passphrase for owner {}", owner_id);
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(VaultError::KeychainError(e.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(target_os = "macos")]
        return "macOS Keychain";

        #[cfg(target_os = "windows")]
        return "Windows Credential Manager";

        #[cfg(target_os = "linux")]
        return "Linux Secret Service";

        #[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
        return "System Keychain";
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keychain_availability() {
        let store = KeychainPassphraseStore::new(Some("test"));
        // Just check that we can query availability without panicking
        if !store.is_available() {
            assert!(matches!(
                store.load("u1"),
                Err(VaultError::KeychainError(_))
            ));
        }
    }
}
