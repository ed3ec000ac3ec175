//! CLI command implementations

pub mod atm;
pub mod card;
pub mod cert;
pub mod logs;
pub mod serve;
pub mod sign;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};
use scs_core::adapters::DirectoryCertificateStore;
use scs_core::config::Config;
use scs_core::ports::CertificateStore;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "scs=info,scs_core=info,tower_http=info";

/// Get the SCS directory from environment or default
pub fn get_scs_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SCS_DIR") {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir().context("Could not find home directory; set SCS_DIR")?;
    Ok(home.join(".scs"))
}

/// Load config, creating the SCS directory if needed
pub fn load_config() -> Result<Config> {
    let scs_dir = get_scs_dir()?;
    std::fs::create_dir_all(&scs_dir)
        .with_context(|| format!("Failed to create SCS directory: {:?}", scs_dir))?;
    Config::load(&scs_dir)
}

pub fn certificate_store(config: &Config) -> Result<DirectoryCertificateStore> {
    Ok(DirectoryCertificateStore::new(config.certs_dir())?)
}

/// Bytes of the caller's own certificate, as presented to the services
pub fn presented_certificate(config: &Config, name: &str) -> Result<Vec<u8>> {
    let store = certificate_store(config)?;
    let issued = store.lookup_certificate(name)?.with_context(|| {
        format!(
            "No personal certificate named '{}'. Issue one with `scs cert issue {} --ou SmartCardUser`",
            name, name
        )
    })?;
    Ok(issued.presented_bytes()?)
}

/// Install the tracing subscriber used by long-running commands
///
/// `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Read a PIN, prompting without echo when not given on the command line
pub fn read_pin(given: Option<u32>, prompt: &str) -> Result<u32> {
    if let Some(pin) = given {
        return Ok(pin);
    }
    let raw = dialoguer::Password::new().with_prompt(prompt).interact()?;
    raw.trim()
        .parse::<u32>()
        .with_context(|| "PIN must be a 4-digit number".to_string())
}
