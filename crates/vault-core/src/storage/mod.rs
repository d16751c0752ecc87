//! Per-device storage for remembered passphrases
//!
//! Two backends are provided:
//! 1. OS Keychain (the default for interactive use)
//! 2. In-memory (tests and sessions that must not touch the keychain)

mod keychain;
mod memory;
mod traits;

pub use keychain::KeychainPassphraseStore;
pub use memory::MemoryPassphraseStore;
pub use traits::PassphraseStore;
