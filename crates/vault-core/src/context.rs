//! Session-scoped key context
//!
//! A [`KeyContext`] is created alongside the authentication session and is fed
//! its lifecycle events. It derives the field key lazily on first use for the
//! signed-in owner, keeps it in memory only, and drops it on sign-out or when
//! the owner changes.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::crypto::{self, DerivedKey, KeyPolicy, SecretString};
use crate::error::{Result, VaultError};
use crate::record::{self, SensitiveFields, SensitiveRecord};
use crate::storage::PassphraseStore;

/// Lifecycle events from the authentication provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(String),
    SignedOut,
}

/// Whether a key is currently held
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyState {
    /// No key in memory
    Unbound,
    /// Key derived and cached for this owner
    Bound { owner_id: String },
}

struct Binding {
    owner_id: String,
    key: Arc<DerivedKey>,
}

struct Inner {
    policy: KeyPolicy,
    /// Owner reported by the last sign-in
    owner_id: Option<String>,
    /// Passphrase supplied during this session
    passphrase: Option<SecretString>,
    bound: Option<Binding>,
}

impl Inner {
    fn unbind(&mut self) {
        if let Some(binding) = self.bound.take() {
            debug!("Discarded field key for owner {}", binding.owner_id);
        }
    }
}

/// Binds a key policy to the signed-in user and encodes/decodes their records
pub struct KeyContext {
    inner: Mutex<Inner>,
    passphrase_store: Option<Arc<dyn PassphraseStore>>,
}

impl KeyContext {
    /// Create an unbound context with no signed-in owner
    pub fn new(policy: KeyPolicy) -> Self {
        Self {
            inner: Mutex::new(Inner {
                policy,
                owner_id: None,
                passphrase: None,
                bound: None,
            }),
            passphrase_store: None,
        }
    }

    /// Use a per-device store for passphrases the user asks to remember
    pub fn with_passphrase_store(mut self, store: Arc<dyn PassphraseStore>) -> Self {
        self.passphrase_store = Some(store);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every mutation leaves Inner consistent, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply an authentication lifecycle event
    pub fn handle(&self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::SignedIn(owner_id) => self.sign_in(&owner_id),
            SessionEvent::SignedOut => {
                self.sign_out();
                Ok(())
            }
        }
    }

    /// Record the signed-in owner; a different owner discards the current key
    pub fn sign_in(&self, owner_id: &str) -> Result<()> {
        if owner_id.is_empty() {
            return Err(VaultError::InvalidInput(
                "Owner id cannot be empty".to_string(),
            ));
        }

        let mut inner = self.lock();
        if inner.owner_id.as_deref() != Some(owner_id) {
            inner.unbind();
            inner.passphrase = None;
            inner.owner_id = Some(owner_id.to_string());
            info!("Signed in owner {}", owner_id);

            if let Some(profile) = inner.policy.profile() {
                if !profile.belongs_to(owner_id) {
                    warn!("Passphrase profile belongs to another owner; set this owner's profile");
                }
            }
        }
        Ok(())
    }

    /// Drop the owner, the key and any session passphrase
    pub fn sign_out(&self) {
        let mut inner = self.lock();
        inner.unbind();
        inner.passphrase = None;
        if let Some(owner_id) = inner.owner_id.take() {
            info!("Signed out owner {}", owner_id);
        }
    }

    /// Replace the key policy; the current key is discarded
    pub fn set_policy(&self, policy: KeyPolicy) {
        let mut inner = self.lock();
        inner.unbind();
        info!("Key policy set to {}", policy.name());
        inner.policy = policy;
    }

    pub fn policy(&self) -> KeyPolicy {
        self.lock().policy.clone()
    }

    pub fn owner_id(&self) -> Option<String> {
        self.lock().owner_id.clone()
    }

    pub fn state(&self) -> KeyState {
        match &self.lock().bound {
            Some(binding) => KeyState::Bound {
                owner_id: binding.owner_id.clone(),
            },
            None => KeyState::Unbound,
        }
    }

    /// Supply the passphrase for the signed-in owner
    ///
    /// The key is derived and checked against the account's profile right
    /// away, so a wrong passphrase is rejected here rather than on first read.
    /// With `remember`, the passphrase is also written to the per-device store.
    pub fn provide_passphrase(&self, passphrase: &str, remember: bool) -> Result<()> {
        if passphrase.is_empty() {
            return Err(VaultError::InvalidInput(
                "Passphrase cannot be empty".to_string(),
            ));
        }

        let mut guard = self.lock();
        let inner = &mut *guard;
        let owner_id = inner.owner_id.clone().ok_or(VaultError::NoActiveSession)?;

        let KeyPolicy::Passphrase(profile) = &inner.policy else {
            return Err(VaultError::InvalidInput(
                "The active key policy does not use a passphrase".to_string(),
            ));
        };

        let key = inner.policy.derive(&owner_id, Some(passphrase))?;
        profile.verify(&key)?;

        if remember {
            match &self.passphrase_store {
                Some(store) => store.save(&owner_id, &SecretString::from(passphrase))?,
                None => {
                    warn!("No passphrase store configured; passphrase kept for this session only")
                }
            }
        }

        inner.passphrase = Some(SecretString::from(passphrase));
        inner.bound = Some(Binding {
            owner_id,
            key: Arc::new(key),
        });
        Ok(())
    }

    /// Forget the remembered passphrase and invalidate the in-memory key
    pub fn forget_passphrase(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.unbind();
        inner.passphrase = None;

        if let (Some(store), Some(owner_id)) = (&self.passphrase_store, &inner.owner_id) {
            store.forget(owner_id)?;
            info!("Forgot remembered passphrase for owner {}", owner_id);
        }
        Ok(())
    }

    /// Key for the signed-in owner, deriving it on first use
    ///
    /// Derive-and-install happens under one lock so concurrent callers never
    /// race to install different keys.
    pub fn current_key(&self) -> Result<Arc<DerivedKey>> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let owner_id = inner.owner_id.clone().ok_or(VaultError::NoActiveSession)?;

        if let Some(binding) = &inner.bound {
            if binding.owner_id == owner_id {
                return Ok(binding.key.clone());
            }
            warn!("Bound key belongs to a different owner; re-deriving");
            inner.unbind();
        }

        let key = match &inner.policy {
            KeyPolicy::Silent { .. } => inner.policy.derive(&owner_id, None)?,
            KeyPolicy::Passphrase(profile) => {
                let passphrase = match &inner.passphrase {
                    Some(p) => p.clone(),
                    None => self.remembered_passphrase(&owner_id)?.ok_or_else(|| {
                        VaultError::InvalidInput(
                            "A passphrase is required by the passphrase key policy".to_string(),
                        )
                    })?,
                };
                let key = inner.policy.derive(&owner_id, Some(passphrase.expose()))?;
                profile.verify(&key)?;
                inner.passphrase = Some(passphrase);
                key
            }
        };

        debug!("Derived {} field key for owner {}", inner.policy.name(), owner_id);
        let key = Arc::new(key);
        inner.bound = Some(Binding {
            owner_id,
            key: key.clone(),
        });
        Ok(key)
    }

    fn remembered_passphrase(&self, owner_id: &str) -> Result<Option<SecretString>> {
        match &self.passphrase_store {
            Some(store) => store.load(owner_id),
            None => Ok(None),
        }
    }

    /// Encrypt the sensitive fields of a record with the session key
    pub fn encode_record(
        &self,
        record: &SensitiveRecord,
        fields: &SensitiveFields,
    ) -> Result<SensitiveRecord> {
        let key = self.current_key()?;
        record::encode_record(record, fields, &key)
    }

    /// Decrypt the sensitive fields of a record with the session key
    pub fn decode_record(
        &self,
        record: &SensitiveRecord,
        fields: &SensitiveFields,
    ) -> Result<SensitiveRecord> {
        let key = self.current_key()?;
        record::decode_record(record, fields, &key)
    }

    /// Encrypt a single value; empty values pass through
    pub fn encrypt_field(&self, value: &str) -> Result<String> {
        let key = self.current_key()?;
        if value.is_empty() {
            return Ok(String::new());
        }
        crypto::encrypt_str(value, &key)
    }

    /// Decrypt a single value; empty values pass through
    pub fn decrypt_field(&self, token: &str) -> Result<String> {
        let key = self.current_key()?;
        if token.is_empty() {
            return Ok(String::new());
        }
        crypto::decrypt_str(token, &key)
    }
}
