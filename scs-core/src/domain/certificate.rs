//! Certificates and certificate-derived roles
//!
//! A presented certificate is the JSON encoding of [`Certificate`]. The
//! subject uses the familiar distinguished-name shape
//! (`CN=oib_manager, OU=Manager`), and the role of the caller is read from
//! its `OU` attribute on every call.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Access level derived from a certificate's organizational unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Manager,
    SmartCardUser,
    Unauthorized,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "Manager",
            Role::SmartCardUser => "SmartCardUser",
            Role::Unauthorized => "Unauthorized",
        }
    }

    /// Map an OU value to a role, case-insensitively
    pub fn from_ou(ou: &str) -> Role {
        let ou = ou.trim();
        if ou.eq_ignore_ascii_case(Role::Manager.as_str()) {
            Role::Manager
        } else if ou.eq_ignore_ascii_case(Role::SmartCardUser.as_str()) {
            Role::SmartCardUser
        } else {
            Role::Unauthorized
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match Role::from_ou(s) {
            Role::Unauthorized => Err(Error::validation(format!(
                "unknown role '{}' (expected Manager or SmartCardUser)",
                s
            ))),
            role => Ok(role),
        }
    }
}

/// Look up one attribute of a `key=value, key=value` subject
pub fn subject_attribute<'a>(subject: &'a str, key: &str) -> Option<&'a str> {
    subject.split(',').find_map(|part| {
        let (k, v) = part.split_once('=')?;
        if k.trim().eq_ignore_ascii_case(key) {
            Some(v.trim())
        } else {
            None
        }
    })
}

/// Build the subject string for a common name and optional role
pub fn subject_for(common_name: &str, role: Option<Role>) -> String {
    match role {
        Some(role) => format!("CN={}, OU={}", common_name, role),
        None => format!("CN={}", common_name),
    }
}

/// Public certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub subject: String,
    /// Hex-encoded ed25519 verifying key
    pub public_key: String,
    pub issued_at: DateTime<Utc>,
}

impl Certificate {
    /// Parse presented certificate bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let cert: Certificate = serde_json::from_slice(bytes)
            .map_err(|e| Error::InvalidCertificate(format!("certificate could not be parsed: {}", e)))?;
        if cert.subject.trim().is_empty() {
            return Err(Error::InvalidCertificate(
                "certificate has an empty subject".to_string(),
            ));
        }
        Ok(cert)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn common_name(&self) -> Option<&str> {
        subject_attribute(&self.subject, "CN")
    }

    pub fn organizational_unit(&self) -> Option<&str> {
        subject_attribute(&self.subject, "OU")
    }

    /// Role carried by this certificate
    pub fn role(&self) -> Role {
        self.organizational_unit()
            .map(Role::from_ou)
            .unwrap_or(Role::Unauthorized)
    }

    /// Decode the public key
    pub fn verifying_key(&self) -> Result<VerifyingKey> {
        let bytes = hex::decode(&self.public_key).map_err(|e| {
            Error::InvalidCertificate(format!("invalid public key hex for {}: {}", self.subject, e))
        })?;
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::InvalidCertificate(format!("public key for {} must be 32 bytes", self.subject))
        })?;
        VerifyingKey::from_bytes(&array).map_err(|e| {
            Error::InvalidCertificate(format!("invalid public key for {}: {}", self.subject, e))
        })
    }
}

/// Certificate together with its private key, as held by a certificate store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateWithKey {
    #[serde(flatten)]
    pub certificate: Certificate,
    /// Hex-encoded ed25519 signing key
    pub signing_key: String,
}

impl CertificateWithKey {
    /// Issue a fresh self-signed key pair for `common_name`
    pub fn generate(common_name: &str, role: Option<Role>) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            certificate: Certificate {
                subject: subject_for(common_name, role),
                public_key: hex::encode(verifying_key.to_bytes()),
                issued_at: Utc::now(),
            },
            signing_key: hex::encode(signing_key.to_bytes()),
        }
    }

    pub fn signing_key(&self) -> Result<SigningKey> {
        let bytes = hex::decode(&self.signing_key).map_err(|e| {
            Error::InvalidCertificate(format!(
                "invalid private key hex for {}: {}",
                self.certificate.subject, e
            ))
        })?;
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            Error::InvalidCertificate(format!(
                "private key for {} must be 32 bytes",
                self.certificate.subject
            ))
        })?;
        Ok(SigningKey::from_bytes(&array))
    }

    /// Bytes to present to a service on a privileged call
    pub fn presented_bytes(&self) -> Result<Vec<u8>> {
        self.certificate.to_bytes()
    }
}
