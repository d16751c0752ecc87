//! AES-256-GCM field encryption
//!
//! Token format: `v1:{iv_hex}:{auth_tag_hex}:{ciphertext_hex}`
//! - `v1`: AES-256-GCM, 12-byte IV, 16-byte tag
//! - IV: 12 bytes (96 bits), fresh per encryption
//! - Auth tag: 16 bytes (128 bits)
//! - Ciphertext: variable length
//!
//! A token carries everything needed to decrypt it except the key.

use std::fmt;
use std::str::FromStr;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::DerivedKey;
use crate::error::{Result, VaultError};

/// Version tag for the current token layout
pub const TOKEN_VERSION: &str = "v1";

const IV_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Self-contained ciphertext for one field value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherToken {
    /// Initialization vector (12 bytes for GCM)
    pub iv: [u8; IV_LEN],
    /// Authentication tag (16 bytes)
    pub auth_tag: [u8; TAG_LEN],
    /// Encrypted ciphertext
    pub ciphertext: Vec<u8>,
}

impl fmt::Display for CipherToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            TOKEN_VERSION,
            hex::encode(self.iv),
            hex::encode(self.auth_tag),
            hex::encode(&self.ciphertext)
        )
    }
}

impl FromStr for CipherToken {
    type Err = VaultError;

    /// Parse from the format: `v1:{iv_hex}:{auth_tag_hex}:{ciphertext_hex}`
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 4 {
            return Err(VaultError::DecryptionFailed(
                "Invalid token format: expected v1:iv:tag:ciphertext".to_string(),
            ));
        }
        if parts[0] != TOKEN_VERSION {
            return Err(VaultError::DecryptionFailed(format!(
                "Unsupported token version: {}",
                parts[0]
            )));
        }

        let iv_bytes = hex::decode(parts[1])
            .map_err(|e| VaultError::DecryptionFailed(format!("Invalid IV hex: {}", e)))?;
        let auth_tag_bytes = hex::decode(parts[2])
            .map_err(|e| VaultError::DecryptionFailed(format!("Invalid auth tag hex: {}", e)))?;
        let ciphertext = hex::decode(parts[3])
            .map_err(|e| VaultError::DecryptionFailed(format!("Invalid ciphertext hex: {}", e)))?;

        let iv: [u8; IV_LEN] = iv_bytes.as_slice().try_into().map_err(|_| {
            VaultError::DecryptionFailed(format!(
                "Invalid IV length: expected {}, got {}",
                IV_LEN,
                iv_bytes.len()
            ))
        })?;
        let auth_tag: [u8; TAG_LEN] = auth_tag_bytes.as_slice().try_into().map_err(|_| {
            VaultError::DecryptionFailed(format!(
                "Invalid auth tag length: expected {}, got {}",
                TAG_LEN,
                auth_tag_bytes.len()
            ))
        })?;

        Ok(Self {
            iv,
            auth_tag,
            ciphertext,
        })
    }
}

impl Serialize for CipherToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CipherToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl CipherToken {
    /// Cheap structural check, without a key, that `s` is in token form
    pub fn looks_like_token(s: &str) -> bool {
        s.parse::<CipherToken>().is_ok()
    }
}

/// Encrypt a field value using AES-256-GCM
///
/// Every call draws a fresh IV, so encrypting the same value twice yields
/// two different tokens.
pub fn encrypt(plaintext: &str, key: &DerivedKey) -> Result<CipherToken> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    // aes-gcm appends the auth tag to the ciphertext
    let ciphertext_with_tag = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| VaultError::EncryptionError(e.to_string()))?;

    if ciphertext_with_tag.len() < TAG_LEN {
        return Err(VaultError::EncryptionError(
            "Ciphertext too short".to_string(),
        ));
    }

    let tag_start = ciphertext_with_tag.len() - TAG_LEN;
    let ciphertext = ciphertext_with_tag[..tag_start].to_vec();
    let mut auth_tag = [0u8; TAG_LEN];
    auth_tag.copy_from_slice(&ciphertext_with_tag[tag_start..]);

    Ok(CipherToken {
        iv,
        auth_tag,
        ciphertext,
    })
}

/// Decrypt a token using AES-256-GCM
///
/// A wrong key or a tampered token fails authentication; it never yields
/// plausible-looking plaintext.
pub fn decrypt(token: &CipherToken, key: &DerivedKey) -> Result<String> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    let nonce = Nonce::from_slice(&token.iv);

    let mut ciphertext_with_tag = token.ciphertext.clone();
    ciphertext_with_tag.extend_from_slice(&token.auth_tag);

    let plaintext = cipher
        .decrypt(nonce, ciphertext_with_tag.as_slice())
        .map_err(|_| {
            VaultError::DecryptionFailed(
                "authentication failed (wrong key or corrupted data)".to_string(),
            )
        })?;

    String::from_utf8(plaintext)
        .map_err(|e| VaultError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
}

/// Encrypt a string and return the serialized token
pub fn encrypt_str(plaintext: &str, key: &DerivedKey) -> Result<String> {
    Ok(encrypt(plaintext, key)?.to_string())
}

/// Parse a serialized token and decrypt it
pub fn decrypt_str(token: &str, key: &DerivedKey) -> Result<String> {
    let token: CipherToken = token.parse()?;
    decrypt(&token, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key(byte: u8) -> DerivedKey {
        DerivedKey::new([byte; 32])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key(1);
        let token = encrypt("0123456789", &key).unwrap();
        assert_eq!(decrypt(&token, &key).unwrap(), "0123456789");
    }

    #[test]
    fn test_string_form_roundtrip() {
        let key = test_key(1);
        let token = encrypt_str("Banco Pichincha", &key).unwrap();

        assert!(token.starts_with("v1:"));
        assert!(CipherToken::looks_like_token(&token));
        assert_eq!(decrypt_str(&token, &key).unwrap(), "Banco Pichincha");
    }

    #[test]
    fn test_unicode_roundtrip() {
        let key = test_key(3);
        let plaintext = "Núñez – cuenta de ahorros 🔐";
        assert_eq!(decrypt_str(&encrypt_str(plaintext, &key).unwrap(), &key).unwrap(), plaintext);
    }

    #[test]
    fn test_same_plaintext_different_tokens() {
        let key = test_key(1);

        let token1 = encrypt("same plaintext", &key).unwrap();
        let token2 = encrypt("same plaintext", &key).unwrap();

        assert_ne!(token1.iv, token2.iv);
        assert_ne!(token1.to_string(), token2.to_string());
    }

    #[test]
    fn test_wrong_key_fails_decryption() {
        let token = encrypt("secret data", &test_key(1)).unwrap();
        let result = decrypt(&token, &test_key(2));

        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_tampered_ciphertext_fails_decryption() {
        let key = test_key(1);
        let mut token = encrypt("secret data", &key).unwrap();
        token.ciphertext[0] ^= 0xFF;

        assert!(decrypt(&token, &key).is_err());
    }

    #[test]
    fn test_tampered_auth_tag_fails_decryption() {
        let key = test_key(1);
        let mut token = encrypt("secret data", &key).unwrap();
        token.auth_tag[0] ^= 0xFF;

        assert!(decrypt(&token, &key).is_err());
    }

    #[test]
    fn test_invalid_format_parsing() {
        for bad in [
            "invalid",
            "v1:a:b",
            "v1:a:b:c:d",
            "v1:not_hex:not_hex:not_hex",
            "v2:000000000000000000000000:00000000000000000000000000000000:00",
            "U2FsdGVkX1+legacyCryptoJsOutput==",
        ] {
            let result = bad.parse::<CipherToken>();
            assert!(matches!(result, Err(VaultError::DecryptionFailed(_))), "{bad}");
        }
    }

    #[test]
    fn test_short_iv_rejected() {
        let result = "v1:0011:00000000000000000000000000000000:00".parse::<CipherToken>();
        assert!(result.unwrap_err().to_string().contains("Invalid IV length"));
    }

    #[test]
    fn test_serde_as_string() {
        let key = test_key(9);
        let token = encrypt("x", &key).unwrap();

        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, format!("\"{}\"", token));

        let parsed: CipherToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }
}
