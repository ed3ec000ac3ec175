//! SCS Core - smart card credential store, failover routing and ATM gateway
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core entities (CredentialRecord, Certificate, EndpointPair, ...)
//! - **ports**: Trait definitions for external dependencies (record store,
//!   certificate store, audit sink, credential endpoint)
//! - **services**: Credential service, authorization guard, replication,
//!   failover connector, ledger and transaction gateway
//! - **adapters**: Concrete implementations (JSON files, DuckDB, HTTP, in-memory)

pub mod adapters;
mod audit_migrations;
pub mod config;
pub mod domain;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use adapters::http::{credential_router, gateway_router, GatewayState, HttpCredentialClient};
use adapters::{DirectoryCertificateStore, DuckDbAuditLog, FileCredentialRepository};
use config::Config;
use domain::{Address, InstanceRole};
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorKind, OperationResult};
pub use domain::{
    Certificate, CertificateWithKey, CredentialRecord, EndpointPair, Role, SignedEnvelope,
    TransactionOutcome,
};

/// Audit log instance name of the gateway
pub const GATEWAY_INSTANCE: &str = "gateway";

/// Everything one credential service instance needs to run
pub struct CredentialContext {
    pub config: Config,
    pub role: InstanceRole,
    pub service: Arc<CredentialService>,
    pub audit: Arc<DuckDbAuditLog>,
    pub certificates: Arc<DirectoryCertificateStore>,
}

impl CredentialContext {
    /// Load config from `scs_dir` and wire an instance of `role`
    /// (the configured role when `None`)
    pub fn new(scs_dir: &Path, role: Option<InstanceRole>) -> Result<Self> {
        let config = Config::load(scs_dir)?;
        Self::from_config(config, role)
    }

    pub fn from_config(config: Config, role: Option<InstanceRole>) -> Result<Self> {
        let role = role.unwrap_or(config.instance_role);

        let repository = Arc::new(FileCredentialRepository::new(config.cards_dir(role))?);
        let certificates = Arc::new(DirectoryCertificateStore::new(config.certs_dir())?);
        let audit = Arc::new(DuckDbAuditLog::open(&config.scs_dir, role.as_str())?);

        // The peer client's timeout bounds how long a push can hold a write
        let peer_address = config.peer_address(role).clone();
        let peer = HttpCredentialClient::new(&peer_address, config.replication_timeout)?;
        let replication = ReplicationPusher::new(role, Arc::new(peer), peer_address.to_string(), audit.clone());

        let service = Arc::new(CredentialService::new(
            repository,
            replication,
            SignedMessageChannel::new(certificates.clone()),
            audit.clone(),
        ));

        Ok(Self {
            config,
            role,
            service,
            audit,
            certificates,
        })
    }

    pub fn listen_address(&self) -> &Address {
        self.config.listen_address(self.role)
    }

    pub fn router(&self) -> axum::Router {
        credential_router(self.service.clone())
    }
}

/// Everything the transaction gateway needs to run
pub struct GatewayContext {
    pub config: Config,
    pub ledger: Arc<Ledger>,
    pub audit: Arc<DuckDbAuditLog>,
    pub state: Arc<GatewayState>,
}

impl GatewayContext {
    pub fn new(scs_dir: &Path) -> Result<Self> {
        let config = Config::load(scs_dir)?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        let ledger = Arc::new(Ledger::with_accounts(config.opening_balances.clone())?);
        let audit = Arc::new(DuckDbAuditLog::open(&config.scs_dir, GATEWAY_INSTANCE)?);

        let endpoints = config.credential_endpoints.clone();
        let primary: SharedEndpoint =
            Arc::new(HttpCredentialClient::new(&endpoints.primary, config.request_timeout)?);
        let backup: SharedEndpoint =
            Arc::new(HttpCredentialClient::new(&endpoints.backup, config.request_timeout)?);

        let gateway = TransactionGateway::new(ledger.clone(), endpoints, primary, backup, audit.clone());
        let state = Arc::new(GatewayState::with_idle_timeout(gateway, config.session_idle_timeout));

        Ok(Self {
            config,
            ledger,
            audit,
            state,
        })
    }

    pub fn listen_address(&self) -> &Address {
        &self.config.gateway_address
    }

    pub fn router(&self) -> axum::Router {
        gateway_router(self.state.clone())
    }
}

/// Failover-aware client for the configured credential service pair
pub fn credential_connector(config: &Config) -> Result<FailoverConnector<HttpCredentialClient>> {
    let connector = FailoverConnector::connect(config.credential_endpoints.clone(), |address| {
        HttpCredentialClient::new(address, config.request_timeout)
    })?;
    Ok(connector)
}
