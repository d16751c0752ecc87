//! Passphrase store trait definition

use crate::crypto::SecretString;
use crate::error::Result;

/// Per-device store for a passphrase the user opted to remember
///
/// Implementations must be local to the device and never synced to the
/// record store.
pub trait PassphraseStore: Send + Sync {
    /// Remember the passphrase for an owner, replacing any previous one
    fn save(&self, owner_id: &str, passphrase: &SecretString) -> Result<()>;

    /// Load the remembered passphrase for an owner
    fn load(&self, owner_id: &str) -> Result<Option<SecretString>>;

    /// Forget the passphrase for an owner; forgetting nothing is not an error
    fn forget(&self, owner_id: &str) -> Result<()>;

    /// Get a human-readable name for this storage backend
    fn backend_name(&self) -> &'static str;
}
