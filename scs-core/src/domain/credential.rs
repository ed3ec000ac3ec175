//! Credential record domain model

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::result::{Error, Result};

/// Smallest PIN a card may carry
pub const MIN_PIN: u32 = 1000;
/// Largest PIN a card may carry
pub const MAX_PIN: u32 = 9999;

const MAX_USERNAME_LEN: usize = 64;

/// A validated four digit PIN
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pin(u32);

impl Pin {
    /// Validate a raw PIN
    pub fn new(raw: u32) -> Result<Self> {
        if !(MIN_PIN..=MAX_PIN).contains(&raw) {
            return Err(Error::validation(format!(
                "PIN must be a 4-digit number between {} and {}",
                MIN_PIN, MAX_PIN
            )));
        }
        Ok(Self(raw))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Lowercase hex SHA-256 of the decimal PIN text
    pub fn hash(&self) -> String {
        hash_pin(self.0)
    }
}

/// Hash a raw PIN exactly as stored records do
///
/// Out of range values hash fine but can never match a stored record,
/// since records are only ever created from validated PINs.
pub fn hash_pin(raw: u32) -> String {
    let digest = Sha256::digest(raw.to_string().as_bytes());
    hex::encode(digest)
}

/// Validate a username used as a record key
///
/// Names double as file names in the directory store, so only a
/// conservative character set is accepted.
pub fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(Error::validation("username cannot be empty"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(Error::validation(format!(
            "username cannot be longer than {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        || username.starts_with('.')
    {
        return Err(Error::validation(format!(
            "username '{}' may only contain letters, digits, '_', '-' and '.'",
            username
        )));
    }
    Ok(())
}

/// Stored username + PIN hash pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub subject_name: String,
    pub pin_hash: String,
}

impl CredentialRecord {
    pub fn new(subject_name: impl Into<String>, pin: Pin) -> Self {
        Self {
            subject_name: subject_name.into(),
            pin_hash: pin.hash(),
        }
    }

    /// Check a raw PIN against the stored hash
    pub fn matches(&self, raw_pin: u32) -> bool {
        self.pin_hash == hash_pin(raw_pin)
    }

    /// Check a record received from elsewhere (a replica) before storing it
    pub fn validate(&self) -> Result<()> {
        validate_username(&self.subject_name)?;
        let well_formed = self.pin_hash.len() == 64
            && self
                .pin_hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !well_formed {
            return Err(Error::validation(format!(
                "record for '{}' does not carry a SHA-256 PIN hash",
                self.subject_name
            )));
        }
        Ok(())
    }
}
