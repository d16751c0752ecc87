//! Process-local passphrase store

use std::collections::HashMap;
use std::sync::Mutex;

use super::PassphraseStore;
use crate::crypto::SecretString;
use crate::error::{Result, VaultError};

/// Keeps remembered passphrases in memory only; gone when the process exits
#[derive(Default)]
pub struct MemoryPassphraseStore {
    entries: Mutex<HashMap<String, SecretString>>,
}

impl MemoryPassphraseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SecretString>>> {
        self.entries
            .lock()
            .map_err(|_| VaultError::StorageError("passphrase store lock poisoned".to_string()))
    }
}

impl PassphraseStore for MemoryPassphraseStore {
    fn save(&self, owner_id: &str, passphrase: &SecretString) -> Result<()> {
        self.lock()?.insert(owner_id.to_string(), passphrase.clone());
        Ok(())
    }

    fn load(&self, owner_id: &str) -> Result<Option<SecretString>> {
        Ok(self.lock()?.get(owner_id).cloned())
    }

    fn forget(&self, owner_id: &str) -> Result<()> {
        self.lock()?.remove(owner_id);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "In-Memory Store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_forget() {
        let store = MemoryPassphraseStore::new();
        assert!(store.load("u1").unwrap().is_none());

        store.save("u1", &SecretString::from("first")).unwrap();
        store.save("u1", &SecretString::from("second")).unwrap();
        assert_eq!(store.load("u1").unwrap().unwrap().expose(), "second");
        assert!(store.load("u2").unwrap().is_none());

        store.forget("u1").unwrap();
        store.forget("u1").unwrap();
        assert!(store.load("u1").unwrap().is_none());
    }
}
