//! Cryptographic primitives for field-level encryption
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption of single field values
//! - Key derivation under the silent (PBKDF2) or passphrase (Argon2id) policy
//! - Secure memory handling with zeroize

mod encryption;
mod key_derivation;
mod secure_memory;

pub use encryption::{decrypt, decrypt_str, encrypt, encrypt_str, CipherToken, TOKEN_VERSION};
pub use key_derivation::{
    derive_key, derive_silent_key, generate_salt, is_weak_passphrase, KeyDerivationParams,
    KeyPolicy, PassphraseProfile, DEFAULT_PEPPER, DEFAULT_SILENT_ITERATIONS,
    MIN_RECOMMENDED_PASSPHRASE_LEN,
};
pub use secure_memory::{DerivedKey, SecretString, KEY_LENGTH};

#[cfg(test)]
pub(crate) use key_derivation::fast_params;
