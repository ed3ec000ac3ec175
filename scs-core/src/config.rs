//! Configuration management
//!
//! Settings live in `<scs_dir>/settings.json`; every field is optional:
//! ```json
//! {
//!   "credentialService": {
//!     "role": "primary",
//!     "primary": "127.0.0.1:9999",
//!     "backup": "127.0.0.1:9998",
//!     "replicationTimeoutMs": 2000
//!   },
//!   "gateway": {
//!     "listen": "127.0.0.1:10000",
//!     "requestTimeoutMs": 5000,
//!     "sessionIdleTimeoutSecs": 900,
//!     "openingBalances": { "marko": "500" }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Address, EndpointPair, InstanceRole, Slot};

pub const DEFAULT_PRIMARY_ADDRESS: &str = "127.0.0.1:9999";
pub const DEFAULT_BACKUP_ADDRESS: &str = "127.0.0.1:9998";
pub const DEFAULT_GATEWAY_ADDRESS: &str = "127.0.0.1:10000";
pub const DEFAULT_REPLICATION_TIMEOUT_MS: u64 = 2000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 900;

/// Environment override for the instance role
pub const ROLE_ENV: &str = "SCS_INSTANCE_ROLE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    credential_service: CredentialServiceSettings,
    #[serde(default)]
    gateway: GatewaySettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialServiceSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<InstanceRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replication_timeout_ms: Option<u64>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GatewaySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    listen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_idle_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    opening_balances: BTreeMap<String, Decimal>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// SCS configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub scs_dir: PathBuf,
    pub instance_role: InstanceRole,
    pub credential_endpoints: EndpointPair,
    pub gateway_address: Address,
    pub replication_timeout: Duration,
    pub request_timeout: Duration,
    /// Gateway sessions unused for this long are discarded
    pub session_idle_timeout: Duration,
    /// Balances the gateway ledger starts with
    pub opening_balances: BTreeMap<String, Decimal>,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the SCS directory
    ///
    /// The instance role can be overridden with `SCS_INSTANCE_ROLE`.
    pub fn load(scs_dir: &Path) -> Result<Self> {
        let settings_path = scs_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %settings_path.display(), error = %e, "ignoring malformed settings");
                SettingsFile::default()
            })
        } else {
            SettingsFile::default()
        };

        let env_role = std::env::var(ROLE_ENV).ok();
        Self::from_settings(scs_dir, raw, env_role.as_deref())
    }

    fn from_settings(scs_dir: &Path, raw: SettingsFile, env_role: Option<&str>) -> Result<Self> {
        let instance_role = match env_role {
            Some(value) => value
                .parse::<InstanceRole>()
                .with_context(|| format!("Invalid {}", ROLE_ENV))?,
            None => raw.credential_service.role.unwrap_or_default(),
        };

        let primary = parse_address(
            raw.credential_service.primary.as_deref(),
            DEFAULT_PRIMARY_ADDRESS,
            "credentialService.primary",
        )?;
        let backup = parse_address(
            raw.credential_service.backup.as_deref(),
            DEFAULT_BACKUP_ADDRESS,
            "credentialService.backup",
        )?;
        let gateway_address = parse_address(
            raw.gateway.listen.as_deref(),
            DEFAULT_GATEWAY_ADDRESS,
            "gateway.listen",
        )?;

        let replication_timeout = Duration::from_millis(
            raw.credential_service
                .replication_timeout_ms
                .unwrap_or(DEFAULT_REPLICATION_TIMEOUT_MS),
        );
        let request_timeout = Duration::from_millis(
            raw.gateway
                .request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS),
        );
        let session_idle_timeout = Duration::from_secs(
            raw.gateway
                .session_idle_timeout_secs
                .unwrap_or(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        );

        Ok(Self {
            scs_dir: scs_dir.to_path_buf(),
            instance_role,
            credential_endpoints: EndpointPair::new(primary, backup),
            gateway_address,
            replication_timeout,
            request_timeout,
            session_idle_timeout,
            opening_balances: raw.gateway.opening_balances.clone(),
            _raw_settings: raw,
        })
    }

    /// Save config to the SCS directory
    /// Preserves settings this crate doesn't manage
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.scs_dir)
            .with_context(|| format!("Failed to create {}", self.scs_dir.display()))?;
        let settings_path = self.scs_dir.join("settings.json");

        let mut settings = self._raw_settings.clone();
        settings.credential_service.role = Some(self.instance_role);
        settings.credential_service.primary = Some(self.credential_endpoints.primary.to_string());
        settings.credential_service.backup = Some(self.credential_endpoints.backup.to_string());
        settings.credential_service.replication_timeout_ms = Some(self.replication_timeout.as_millis() as u64);
        settings.gateway.listen = Some(self.gateway_address.to_string());
        settings.gateway.request_timeout_ms = Some(self.request_timeout.as_millis() as u64);
        settings.gateway.session_idle_timeout_secs = Some(self.session_idle_timeout.as_secs());
        settings.gateway.opening_balances = self.opening_balances.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }

    /// Address a credential instance of `role` listens on
    pub fn listen_address(&self, role: InstanceRole) -> &Address {
        self.credential_endpoints.address(slot_of(role))
    }

    /// Address of the paired instance
    pub fn peer_address(&self, role: InstanceRole) -> &Address {
        self.credential_endpoints.address(slot_of(role).other())
    }

    /// Record directory of a credential instance
    pub fn cards_dir(&self, role: InstanceRole) -> PathBuf {
        self.scs_dir.join("cards").join(role.as_str())
    }

    pub fn certs_dir(&self) -> PathBuf {
        self.scs_dir.join("certs")
    }
}

fn slot_of(role: InstanceRole) -> Slot {
    match role {
        InstanceRole::Primary => Slot::Primary,
        InstanceRole::Backup => Slot::Backup,
    }
}

fn parse_address(value: Option<&str>, default: &str, field: &str) -> Result<Address> {
    let raw = value.unwrap_or(default);
    Address::new(raw).with_context(|| format!("Invalid address in {}: '{}'", field, raw))
}
