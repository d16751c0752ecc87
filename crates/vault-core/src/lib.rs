//! # vault-core
//!
//! Field-level encryption for the account vault:
//! - Key derivation under a silent (owner id + pepper) or passphrase policy
//! - AES-256-GCM encryption of single values into self-contained tokens
//! - Selective encoding of the sensitive fields of a record
//! - A session-scoped key context driven by sign-in/sign-out events

pub mod context;
pub mod crypto;
pub mod error;
pub mod record;
pub mod settings;
pub mod storage;

pub use context::{KeyContext, KeyState, SessionEvent};
pub use crypto::{
    decrypt, decrypt_str, encrypt, encrypt_str, generate_salt, CipherToken, DerivedKey,
    KeyDerivationParams, KeyPolicy, PassphraseProfile, SecretString,
};
pub use error::{Result, VaultError};
pub use record::{
    decode_record, encode_record, FieldValue, RecordKind, SensitiveFields, SensitiveRecord,
};
pub use settings::{PolicyKind, Settings, SettingsManager};
pub use storage::{KeychainPassphraseStore, MemoryPassphraseStore, PassphraseStore};
