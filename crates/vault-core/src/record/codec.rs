//! Field-selective record encoding
//!
//! Only the named fields holding non-empty text go through the cipher.
//! Identifiers, owner ids, timestamps and anything non-textual are copied
//! unchanged, and the key set of the record never changes.

use tracing::debug;

use super::types::{FieldValue, SensitiveFields, SensitiveRecord};
use crate::crypto::{decrypt_str, encrypt_str, DerivedKey};
use crate::error::{Result, VaultError};

/// Encrypt the sensitive fields of `record` before it is written to the store
pub fn encode(
    record: &SensitiveRecord,
    fields: &SensitiveFields,
    key: &DerivedKey,
) -> Result<SensitiveRecord> {
    transform(record, fields, |name, value| {
        encrypt_str(value, key).map_err(|e| match e {
            VaultError::EncryptionError(msg) => {
                VaultError::EncryptionError(format!("field `{}`: {}", name, msg))
            }
            other => other,
        })
    })
}

/// Decrypt the sensitive fields of `record` after it is read from the store
///
/// Fails as a whole if any sensitive field does not decrypt; no partially
/// decoded record is ever returned.
pub fn decode(
    record: &SensitiveRecord,
    fields: &SensitiveFields,
    key: &DerivedKey,
) -> Result<SensitiveRecord> {
    transform(record, fields, |name, value| {
        decrypt_str(value, key).map_err(|e| match e {
            VaultError::DecryptionFailed(msg) => {
                VaultError::DecryptionFailed(format!("field `{}`: {}", name, msg))
            }
            other => other,
        })
    })
}

fn transform<F>(
    record: &SensitiveRecord,
    fields: &SensitiveFields,
    mut apply: F,
) -> Result<SensitiveRecord>
where
    F: FnMut(&str, &str) -> Result<String>,
{
    let mut out = record.clone();
    let mut touched = 0usize;

    for name in fields.iter() {
        let Some(FieldValue::Text(value)) = out.get_mut(name) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let replaced = apply(name, value.as_str())?;
        *value = replaced;
        touched += 1;
    }

    debug!("Transformed {} of {} sensitive fields", touched, fields.len());
    Ok(out)
}
