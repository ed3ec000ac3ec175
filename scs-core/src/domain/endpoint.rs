//! Endpoint addresses and the primary/backup pair

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// A `host:port` network address of a service instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn new(raw: impl AsRef<str>) -> Result<Self> {
        let raw = raw.as_ref().trim();
        let raw = raw
            .strip_prefix("http://")
            .unwrap_or(raw)
            .trim_end_matches('/');

        let (host, port) = raw
            .rsplit_once(':')
            .ok_or_else(|| Error::validation(format!("address '{}' must be host:port", raw)))?;
        if host.is_empty() {
            return Err(Error::validation(format!("address '{}' has no host", raw)));
        }
        port.parse::<u16>()
            .map_err(|_| Error::validation(format!("address '{}' has an invalid port", raw)))?;

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base URL for HTTP requests to this address
    pub fn base_url(&self) -> String {
        format!("http://{}", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Address::new(s)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Address::new(value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// Which side of a pair is currently in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Primary,
    Backup,
}

impl Slot {
    pub fn other(self) -> Slot {
        match self {
            Slot::Primary => Slot::Backup,
            Slot::Backup => Slot::Primary,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Primary => f.write_str("primary"),
            Slot::Backup => f.write_str("backup"),
        }
    }
}

/// Primary and backup address of one replicated service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointPair {
    pub primary: Address,
    pub backup: Address,
}

impl EndpointPair {
    pub fn new(primary: Address, backup: Address) -> Self {
        Self { primary, backup }
    }

    pub fn address(&self, slot: Slot) -> &Address {
        match slot {
            Slot::Primary => &self.primary,
            Slot::Backup => &self.backup,
        }
    }
}
