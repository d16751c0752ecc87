//! Error types for vault-core

use thiserror::Error;

/// Result type alias for vault operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Vault error types
#[derive(Error, Debug)]
pub enum VaultError {
    /// Missing owner id, missing required passphrase, or otherwise malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ciphertext could not be parsed or authenticated under the given key
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    /// Encode/decode attempted while no owner is signed in
    #[error("No active session - sign in before reading or writing records")]
    NoActiveSession,

    #[error("Encryption failed: {0}")]
    EncryptionError(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationError(String),

    #[error("Keychain error: {0}")]
    KeychainError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether this error means stored data could not be read back under the active key.
    ///
    /// Callers use this to show "wrong key or corrupted data" instead of the raw value.
    pub fn is_unreadable_data(&self) -> bool {
        matches!(self, VaultError::DecryptionFailed(_))
    }
}
