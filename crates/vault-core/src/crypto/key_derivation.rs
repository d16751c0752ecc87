//! Field key derivation
//!
//! Two policies are supported and they are deliberately not interchangeable:
//!
//! - [`KeyPolicy::Silent`] derives the key from the owner identifier and an
//!   application pepper with PBKDF2-HMAC-SHA256. Nothing secret goes in, so it
//!   only protects data at rest against a compromised record store. Anyone who
//!   knows the owner id and the pepper can rebuild the key.
//! - [`KeyPolicy::Passphrase`] derives the key from a user-chosen passphrase
//!   with Argon2id and a random per-account salt. The owner id is fed to
//!   Argon2 as its secret input, so two owners sharing a passphrase and salt
//!   still get different keys. Losing the passphrase makes every value
//!   encrypted under it permanently unreadable.

use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::encryption::{decrypt, encrypt, CipherToken};
use super::secure_memory::KEY_LENGTH;
use super::DerivedKey;
use crate::error::{Result, VaultError};

/// Application-wide pepper for the silent policy
pub const DEFAULT_PEPPER: &str = "account-vault/field-key/v1";

/// PBKDF2 rounds for the silent policy
pub const DEFAULT_SILENT_ITERATIONS: u32 = 10_000;

/// Passphrases shorter than this are accepted but flagged as weak
pub const MIN_RECOMMENDED_PASSPHRASE_LEN: usize = 8;

/// Known plaintext sealed into a passphrase profile
const CHECK_PLAINTEXT: &str = "account-vault-passphrase-check";

/// Parameters for Argon2id key derivation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDerivationParams {
    /// Memory cost in KiB (default: 65536 = 64MB)
    pub memory_cost: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KeyDerivationParams {
    fn default() -> Self {
        Self {
            memory_cost: 65536, // 64 MB
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Generate a cryptographically secure random salt (base64, no padding)
pub fn generate_salt() -> String {
    SaltString::generate(&mut OsRng).to_string()
}

/// Advisory check; derivation itself does not enforce a minimum length
pub fn is_weak_passphrase(passphrase: &str) -> bool {
    passphrase.chars().count() < MIN_RECOMMENDED_PASSPHRASE_LEN
}

/// Derive a 256-bit key from a passphrase using Argon2id
///
/// # Arguments
/// * `owner_id` - Owner the key is bound to (Argon2 secret input)
/// * `passphrase` - The user's passphrase
/// * `salt` - A salt string (use `generate_salt()` to create one)
/// * `params` - Optional key derivation parameters
pub fn derive_key(
    owner_id: &str,
    passphrase: &str,
    salt: &str,
    params: Option<&KeyDerivationParams>,
) -> Result<DerivedKey> {
    let params = params.cloned().unwrap_or_default();

    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?;

    let argon2 = Argon2::new_with_secret(
        owner_id.as_bytes(),
        Algorithm::Argon2id,
        Version::V0x13,
        argon2_params,
    )
    .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?;

    let salt = SaltString::from_b64(salt)
        .map_err(|e| VaultError::KeyDerivationError(format!("Invalid salt: {}", e)))?;

    let password_hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| VaultError::KeyDerivationError(e.to_string()))?;

    let hash = password_hash
        .hash
        .ok_or_else(|| VaultError::KeyDerivationError("No hash output".to_string()))?;

    DerivedKey::from_slice(hash.as_bytes())
        .ok_or_else(|| VaultError::KeyDerivationError("Unexpected hash output length".to_string()))
}

/// Derive a 256-bit key from the owner id alone using PBKDF2-HMAC-SHA256
///
/// Salt is `pepper || owner_id`; the owner id is also the password.
pub fn derive_silent_key(owner_id: &str, pepper: &str, iterations: u32) -> Result<DerivedKey> {
    if iterations == 0 {
        return Err(VaultError::KeyDerivationError(
            "PBKDF2 iteration count must be positive".to_string(),
        ));
    }

    let mut salt = Vec::with_capacity(pepper.len() + owner_id.len());
    salt.extend_from_slice(pepper.as_bytes());
    salt.extend_from_slice(owner_id.as_bytes());

    let mut key_bytes = [0u8; KEY_LENGTH];
    pbkdf2::pbkdf2_hmac::<Sha256>(owner_id.as_bytes(), &salt, iterations, &mut key_bytes);

    Ok(DerivedKey::new(key_bytes))
}

/// Non-secret per-account material for the passphrase policy
///
/// Persisted alongside the owner's record set so the same key can be rebuilt
/// on any device from the same passphrase. A profile belongs to exactly one
/// owner and derivation for anyone else is refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassphraseProfile {
    /// Owner this profile was generated for
    pub owner_id: String,
    /// Random Argon2 salt (base64)
    pub salt: String,
    /// Argon2id cost parameters
    #[serde(default)]
    pub params: KeyDerivationParams,
    /// Known plaintext encrypted under the derived key, if sealed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CipherToken>,
}

impl PassphraseProfile {
    /// Create a profile for `owner_id` with a fresh random salt
    pub fn generate(owner_id: &str, params: KeyDerivationParams) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            salt: generate_salt(),
            params,
            check: None,
        }
    }

    /// Store a check token so a wrong passphrase can be rejected up front
    pub fn seal(&mut self, key: &DerivedKey) -> Result<()> {
        self.check = Some(encrypt(CHECK_PLAINTEXT, key)?);
        Ok(())
    }

    pub fn belongs_to(&self, owner_id: &str) -> bool {
        self.owner_id == owner_id
    }

    pub fn is_sealed(&self) -> bool {
        self.check.is_some()
    }

    /// Confirm `key` matches the sealed check token
    ///
    /// An unsealed profile accepts any key.
    pub fn verify(&self, key: &DerivedKey) -> Result<()> {
        let Some(check) = &self.check else {
            return Ok(());
        };

        match decrypt(check, key) {
            Ok(plaintext) if plaintext == CHECK_PLAINTEXT => Ok(()),
            Ok(_) => Err(VaultError::DecryptionFailed(
                "passphrase check mismatch".to_string(),
            )),
            Err(_) => Err(VaultError::DecryptionFailed(
                "passphrase does not match this account".to_string(),
            )),
        }
    }
}

/// How the field key is obtained for a signed-in owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum KeyPolicy {
    /// Low assurance: key is a function of the public owner id and a pepper
    Silent { pepper: String, iterations: u32 },
    /// Key requires a user passphrase; unrecoverable if the passphrase is lost
    Passphrase(PassphraseProfile),
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self::silent()
    }
}

impl KeyPolicy {
    /// Silent policy with the built-in pepper
    pub fn silent() -> Self {
        Self::silent_with_pepper(DEFAULT_PEPPER)
    }

    /// Silent policy with a per-installation pepper
    pub fn silent_with_pepper(pepper: &str) -> Self {
        Self::Silent {
            pepper: pepper.to_string(),
            iterations: DEFAULT_SILENT_ITERATIONS,
        }
    }

    pub fn passphrase(profile: PassphraseProfile) -> Self {
        Self::Passphrase(profile)
    }

    pub fn requires_passphrase(&self) -> bool {
        matches!(self, Self::Passphrase(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Silent { .. } => "silent",
            Self::Passphrase(_) => "passphrase",
        }
    }

    /// Passphrase profile, if this is the passphrase policy
    pub fn profile(&self) -> Option<&PassphraseProfile> {
        match self {
            Self::Passphrase(profile) => Some(profile),
            Self::Silent { .. } => None,
        }
    }

    /// Derive the field key for `owner_id`
    ///
    /// Deterministic: the same policy and inputs always give the same key.
    /// The silent policy ignores `passphrase`. The passphrase policy refuses
    /// an owner other than the one its profile was generated for.
    pub fn derive(&self, owner_id: &str, passphrase: Option<&str>) -> Result<DerivedKey> {
        if owner_id.is_empty() {
            return Err(VaultError::InvalidInput(
                "Owner id cannot be empty".to_string(),
            ));
        }

        match self {
            Self::Silent { pepper, iterations } => derive_silent_key(owner_id, pepper, *iterations),
            Self::Passphrase(profile) => {
                if !profile.belongs_to(owner_id) {
                    return Err(VaultError::InvalidInput(format!(
                        "Passphrase profile belongs to a different owner than {}",
                        owner_id
                    )));
                }
                let passphrase = passphrase.filter(|p| !p.is_empty()).ok_or_else(|| {
                    VaultError::InvalidInput(
                        "A passphrase is required by the passphrase key policy".to_string(),
                    )
                })?;
                derive_key(owner_id, passphrase, &profile.salt, Some(&profile.params))
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn fast_params() -> KeyDerivationParams {
    KeyDerivationParams {
        memory_cost: 8192, // 8 MB (faster for testing)
        time_cost: 1,
        parallelism: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_salt() {
        let salt1 = generate_salt();
        let salt2 = generate_salt();

        assert_ne!(salt1, salt2);
        assert!(!salt1.is_empty());
    }

    #[test]
    fn test_derive_key_deterministic() {
        let salt = generate_salt();

        let key1 = derive_key("u1", "test-password-123", &salt, Some(&fast_params())).unwrap();
        let key2 = derive_key("u1", "test-password-123", &salt, Some(&fast_params())).unwrap();

        assert_eq!(key1, key2);
    }

    #[test]
    fn test_derive_key_different_passwords() {
        let salt = generate_salt();

        let key1 = derive_key("u1", "password1", &salt, Some(&fast_params())).unwrap();
        let key2 = derive_key("u1", "password2", &salt, Some(&fast_params())).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_derive_key_different_salts() {
        let (salt1, salt2) = (generate_salt(), generate_salt());
        let key1 = derive_key("u1", "test-password", &salt1, Some(&fast_params())).unwrap();
        let key2 = derive_key("u1", "test-password", &salt2, Some(&fast_params())).unwrap();

        assert_ne!(key1, key2);
    }

    #[test]
    fn test_derive_key_invalid_salt() {
        let result = derive_key("u1", "pw", "not a salt!", Some(&fast_params()));
        assert!(matches!(result, Err(VaultError::KeyDerivationError(_))));
    }

    #[test]
    fn test_silent_key_deterministic() {
        let key1 = KeyPolicy::silent().derive("user-42", None).unwrap();
        let key2 = KeyPolicy::silent().derive("user-42", None).unwrap();
        assert_eq!(key1, key2);
    }

    #[test]
    fn test_silent_key_separates_owners() {
        let policy = KeyPolicy::silent();
        assert_ne!(
            policy.derive("u1", None).unwrap(),
            policy.derive("u2", None).unwrap()
        );
    }

    #[test]
    fn test_silent_key_depends_on_pepper() {
        let a = KeyPolicy::silent_with_pepper("install-a").derive("u1", None).unwrap();
        let b = KeyPolicy::silent_with_pepper("install-b").derive("u1", None).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_silent_ignores_passphrase() {
        let policy = KeyPolicy::silent();
        assert_eq!(
            policy.derive("u1", None).unwrap(),
            policy.derive("u1", Some("whatever")).unwrap()
        );
    }

    #[test]
    fn test_empty_owner_rejected() {
        let result = KeyPolicy::silent().derive("", None);
        assert!(matches!(result, Err(VaultError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let policy = KeyPolicy::Silent {
            pepper: DEFAULT_PEPPER.to_string(),
            iterations: 0,
        };
        assert!(policy.derive("u1", None).is_err());
    }

    #[test]
    fn test_passphrase_required() {
        let policy = KeyPolicy::passphrase(PassphraseProfile::generate("u1", fast_params()));

        assert!(matches!(policy.derive("u1", None), Err(VaultError::InvalidInput(_))));
        assert!(matches!(policy.derive("u1", Some("")), Err(VaultError::InvalidInput(_))));
        assert!(policy.derive("u1", Some("long enough passphrase")).is_ok());
    }

    #[test]
    fn test_passphrase_key_bound_to_owner() {
        let salt = generate_salt();
        let k1 = derive_key("u1", "shared passphrase", &salt, Some(&fast_params())).unwrap();
        let k2 = derive_key("u2", "shared passphrase", &salt, Some(&fast_params())).unwrap();
        assert_ne!(k1, k2);
    }

    #[test]
    fn test_profile_refuses_other_owner() {
        let profile = PassphraseProfile::generate("u1", fast_params());
        let policy = KeyPolicy::passphrase(profile.clone());

        assert!(policy.derive("u1", Some("shared passphrase")).is_ok());
        assert!(matches!(
            policy.derive("u2", Some("shared passphrase")),
            Err(VaultError::InvalidInput(_))
        ));

        // Same salt handed to another owner still yields a different key
        let other = KeyPolicy::passphrase(PassphraseProfile {
            owner_id: "u2".to_string(),
            ..profile
        });
        assert_ne!(
            policy.derive("u1", Some("shared passphrase")).unwrap(),
            other.derive("u2", Some("shared passphrase")).unwrap()
        );
    }

    #[test]
    fn test_profile_seal_and_verify() {
        let mut profile = PassphraseProfile::generate("u1", fast_params());
        let policy = KeyPolicy::passphrase(profile.clone());
        let right = policy.derive("u1", Some("right passphrase")).unwrap();
        let wrong = policy.derive("u1", Some("wrong passphrase")).unwrap();

        assert!(profile.verify(&wrong).is_ok());

        profile.seal(&right).unwrap();
        assert!(profile.is_sealed());
        assert!(profile.verify(&right).is_ok());
        assert!(matches!(profile.verify(&wrong), Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_profile_json_shape() {
        let profile = PassphraseProfile::generate("u1", fast_params());
        let json = serde_json::to_value(&profile).unwrap();

        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["params"]["memoryCost"], 8192);
        assert!(json.get("check").is_none());

        let parsed: PassphraseProfile = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, profile);
    }

    #[test]
    fn test_weak_passphrase_advisory() {
        assert!(is_weak_passphrase("short"));
        assert!(!is_weak_passphrase("eight ch"));
    }
}
