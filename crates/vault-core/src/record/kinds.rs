//! Built-in record kinds and their sensitive fields

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{SensitiveFields, SensitiveRecord};
use crate::error::VaultError;

const BANK_FIELDS: &[&str] = &[
    "bankName",
    "firstName",
    "lastName",
    "idNumber",
    "accountType",
    "accountNumber",
];
const MAIL_FIELDS: &[&str] = &["username", "password"];
const OTHER_FIELDS: &[&str] = &["platform", "username", "password"];

/// The kinds of records the vault keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Bank account details and holder identity
    BankAccount,
    /// Mail provider login
    MailAccount,
    /// Any other platform login
    OtherAccount,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::BankAccount,
        RecordKind::MailAccount,
        RecordKind::OtherAccount,
    ];

    /// Record store collection holding this kind
    pub fn collection(&self) -> &'static str {
        match self {
            RecordKind::BankAccount => "bankData",
            RecordKind::MailAccount => "gmailAccounts",
            RecordKind::OtherAccount => "otherAccounts",
        }
    }

    /// User-entered fields; every one of them is sensitive
    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            RecordKind::BankAccount => BANK_FIELDS,
            RecordKind::MailAccount => MAIL_FIELDS,
            RecordKind::OtherAccount => OTHER_FIELDS,
        }
    }

    pub fn sensitive_fields(&self) -> SensitiveFields {
        SensitiveFields::from(self.field_names())
    }

    /// Form fields that are absent or blank in `record`
    pub fn missing_fields(&self, record: &SensitiveRecord) -> Vec<&'static str> {
        self.field_names()
            .iter()
            .copied()
            .filter(|name| record.text(name).map_or(true, |v| v.trim().is_empty()))
            .collect()
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::BankAccount => "bank",
            RecordKind::MailAccount => "mail",
            RecordKind::OtherAccount => "other",
        };
        f.write_str(name)
    }
}

impl FromStr for RecordKind {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bank" | "bankData" => Ok(RecordKind::BankAccount),
            "mail" | "gmail" | "gmailAccounts" => Ok(RecordKind::MailAccount),
            "other" | "otherAccounts" => Ok(RecordKind::OtherAccount),
            other => Err(VaultError::InvalidInput(format!(
                "Unknown record kind: {} (expected bank, mail or other)",
                other
            ))),
        }
    }
}
