//! Role of a credential service instance in its primary/backup pair

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::result::{Error, Result};

/// Which side of the replication pair an instance runs as
///
/// Also used as the origin tag on replicated records: only a primary ever
/// pushes, and a replica is never pushed onward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceRole {
    #[default]
    Primary,
    Backup,
}

impl InstanceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceRole::Primary => "primary",
            InstanceRole::Backup => "backup",
        }
    }
}

impl fmt::Display for InstanceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "main" => Ok(InstanceRole::Primary),
            "backup" | "standby" => Ok(InstanceRole::Backup),
            other => Err(Error::validation(format!(
                "unknown instance role '{}' (expected primary or backup)",
                other
            ))),
        }
    }
}
