//! End-to-end tests over real sockets
//!
//! Starts a primary and a backup credential service and a gateway on
//! ephemeral ports, then drives them with the blocking HTTP clients.
//!
//! Run with: cargo test --test http_end_to_end_test -- --nocapture

use std::sync::Arc;
use std::time::Duration;

use rust_decimal_macros::dec;

use scs_core::adapters::http::{
    credential_router, gateway_router, BackgroundServer, GatewayState, HttpCredentialClient, HttpGatewayClient,
};
use scs_core::adapters::{InMemoryCertificateStore, InMemoryCredentialRepository, MemoryAuditSink, TracingAuditSink};
use scs_core::domain::{subject_for, InstanceRole, Pin, Role, Slot};
use scs_core::ports::{CertificateStore, CredentialEndpoint, StoreContainer};
use scs_core::services::{
    CredentialService, FailoverConnector, Ledger, ReplicationPusher, SharedEndpoint, SignedMessageChannel,
    TransactionGateway,
};
use scs_core::{CertificateWithKey, CredentialRecord, EndpointPair, Error};

const TIMEOUT: Duration = Duration::from_secs(2);

fn presented(name: &str, role: Role) -> Vec<u8> {
    let mut issued = CertificateWithKey::generate(name, None);
    issued.certificate.subject = subject_for(name, Some(role));
    issued.presented_bytes().unwrap()
}

/// Servers are declared first so they stop before the services drop; the
/// services' blocking peer clients must be released off the server runtimes.
struct Deployment {
    gateway_server: BackgroundServer,
    primary_server: Option<BackgroundServer>,
    backup_server: BackgroundServer,
    _gateway_state: Arc<GatewayState>,
    _primary: Arc<CredentialService>,
    _backup: Arc<CredentialService>,
    certificates: Arc<InMemoryCertificateStore>,
    endpoints: EndpointPair,
    manager: Vec<u8>,
    client: Vec<u8>,
}

impl Deployment {
    fn start() -> Self {
        let certificates = Arc::new(InMemoryCertificateStore::new());

        let backup_audit = Arc::new(MemoryAuditSink::new());
        let backup = Arc::new(CredentialService::new(
            Arc::new(InMemoryCredentialRepository::new()),
            ReplicationPusher::disabled(InstanceRole::Backup, backup_audit.clone()),
            SignedMessageChannel::new(certificates.clone()),
            backup_audit,
        ));
        let backup_server = BackgroundServer::start(credential_router(backup.clone())).unwrap();

        let peer = HttpCredentialClient::new(backup_server.address(), TIMEOUT).unwrap();
        let primary_audit = Arc::new(MemoryAuditSink::new());
        let primary = Arc::new(CredentialService::new(
            Arc::new(InMemoryCredentialRepository::new()),
            ReplicationPusher::new(
                InstanceRole::Primary,
                Arc::new(peer),
                backup_server.address().to_string(),
                primary_audit.clone(),
            ),
            SignedMessageChannel::new(certificates.clone()),
            primary_audit,
        ));
        let primary_server = BackgroundServer::start(credential_router(primary.clone())).unwrap();

        let endpoints = EndpointPair::new(primary_server.address().clone(), backup_server.address().clone());
        let gateway = TransactionGateway::new(
            Arc::new(Ledger::new()),
            endpoints.clone(),
            Arc::new(HttpCredentialClient::new(&endpoints.primary, TIMEOUT).unwrap()) as SharedEndpoint,
            Arc::new(HttpCredentialClient::new(&endpoints.backup, TIMEOUT).unwrap()) as SharedEndpoint,
            Arc::new(TracingAuditSink::new("gateway")),
        );
        let gateway_state = Arc::new(GatewayState::new(gateway));
        let gateway_server = BackgroundServer::start(gateway_router(gateway_state.clone())).unwrap();

        Self {
            gateway_server,
            primary_server: Some(primary_server),
            backup_server,
            _gateway_state: gateway_state,
            _primary: primary,
            _backup: backup,
            certificates,
            endpoints,
            manager: presented("oib_manager", Role::Manager),
            client: presented("atm_client", Role::SmartCardUser),
        }
    }

    fn primary_client(&self) -> HttpCredentialClient {
        HttpCredentialClient::new(&self.endpoints.primary, TIMEOUT).unwrap()
    }

    fn backup_client(&self) -> HttpCredentialClient {
        HttpCredentialClient::new(self.backup_server.address(), TIMEOUT).unwrap()
    }

    fn atm(&self) -> HttpGatewayClient {
        HttpGatewayClient::new(self.gateway_server.address(), TIMEOUT).unwrap()
    }

    fn stop_primary(&mut self) {
        if let Some(server) = self.primary_server.take() {
            server.stop();
        }
    }
}

#[test]
fn test_instances_report_their_role() {
    let deployment = Deployment::start();
    assert_eq!(deployment.primary_client().instance_role().unwrap(), InstanceRole::Primary);
    assert_eq!(deployment.backup_client().instance_role().unwrap(), InstanceRole::Backup);
    assert_eq!(deployment.atm().ping().unwrap(), 0);
}

#[test]
fn test_card_created_on_primary_reaches_backup() {
    let deployment = Deployment::start();
    let primary = deployment.primary_client();

    primary.create_credential("marko", 1234, Some(&deployment.manager)).unwrap();

    assert!(primary.validate_pin("marko", 1234).unwrap());
    assert!(deployment.backup_client().validate_pin("marko", 1234).unwrap());
    assert!(!deployment.backup_client().validate_pin("marko", 1111).unwrap());
}

#[test]
fn test_errors_keep_their_kind_over_the_wire() {
    let deployment = Deployment::start();
    let primary = deployment.primary_client();
    primary.create_credential("marko", 1234, Some(&deployment.manager)).unwrap();

    assert!(matches!(
        primary.create_credential("marko", 1234, Some(&deployment.manager)),
        Err(Error::AlreadyExists(_))
    ));
    assert!(matches!(
        primary.list_active_accounts(Some(&deployment.client)),
        Err(Error::AccessDenied(_))
    ));
    assert!(matches!(primary.list_active_accounts(None), Err(Error::AccessDenied(_))));
    assert!(matches!(
        primary.create_credential("ana", 4321, None),
        Err(Error::InvalidCertificate(_))
    ));
    assert!(matches!(
        primary.create_credential("ana", 12, Some(&deployment.manager)),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        primary.rotate_pin("marko", 9999, 4321, Some(&deployment.client)),
        Err(Error::AuthenticationFailed(_))
    ));

    let record = CredentialRecord::new("eve", Pin::new(1234).unwrap());
    assert!(matches!(
        deployment.backup_client().replicate(&record, InstanceRole::Backup),
        Err(Error::Validation(_))
    ));
}

#[test]
fn test_atm_session_over_http() {
    let deployment = Deployment::start();
    deployment
        .primary_client()
        .create_credential("marko", 1234, Some(&deployment.manager))
        .unwrap();

    let mut atm = deployment.atm();
    assert!(!atm.authenticate("marko", 4444, Some(&deployment.client)).unwrap());
    assert!(!atm.deposit("marko", dec!(10)).unwrap().ok);

    assert!(atm.authenticate("marko", 1234, Some(&deployment.client)).unwrap());
    assert_eq!(atm.balance("marko").unwrap(), None);

    let deposit = atm.deposit("marko", dec!(500)).unwrap();
    assert!(deposit.ok);
    let withdrawal = atm.withdraw("marko", dec!(600)).unwrap();
    assert!(!withdrawal.ok);
    assert_eq!(withdrawal.balance, Some(dec!(500)));
    assert_eq!(atm.balance("marko").unwrap(), Some(dec!(500)));

    assert!(matches!(
        atm.active_accounts(Some(&deployment.client)),
        Err(Error::AccessDenied(_))
    ));

    assert_eq!(atm.ping().unwrap(), 1);
    atm.close().unwrap();
    assert_eq!(deployment.atm().ping().unwrap(), 0);
}

#[test]
fn test_dropped_atm_client_releases_its_session() {
    let deployment = Deployment::start();
    deployment
        .primary_client()
        .create_credential("marko", 1234, Some(&deployment.manager))
        .unwrap();

    {
        let mut atm = deployment.atm();
        assert!(!atm.authenticate("marko", 4444, Some(&deployment.client)).unwrap());
        assert_eq!(deployment.atm().ping().unwrap(), 1);
    }

    assert_eq!(deployment.atm().ping().unwrap(), 0);
}

#[test]
fn test_failover_when_primary_stops() {
    let mut deployment = Deployment::start();
    deployment
        .primary_client()
        .create_credential("marko", 1234, Some(&deployment.manager))
        .unwrap();

    deployment.stop_primary();

    let mut connector = FailoverConnector::connect(deployment.endpoints.clone(), |address| {
        HttpCredentialClient::new(address, TIMEOUT)
    })
    .unwrap();
    assert!(connector.call(|c| c.validate_pin("marko", 1234)).unwrap());
    assert_eq!(connector.current(), Slot::Backup);

    let mut atm = deployment.atm();
    assert!(atm.authenticate("marko", 1234, Some(&deployment.client)).unwrap());
    assert!(atm.deposit("marko", dec!(25)).unwrap().ok);
    assert_eq!(
        atm.active_accounts(Some(&deployment.manager)).unwrap(),
        vec!["marko".to_string()]
    );
}

#[test]
fn test_signed_message_is_verified_by_the_service() {
    let deployment = Deployment::start();
    let sender = CertificateWithKey::generate("branch_office", Some(Role::SmartCardUser));
    deployment
        .certificates
        .install(StoreContainer::TrustedPeople, &sender)
        .unwrap();

    let signing_store = Arc::new(InMemoryCertificateStore::new());
    signing_store.install(StoreContainer::Personal, &sender).unwrap();
    let channel = SignedMessageChannel::new(signing_store);

    let envelope = channel.sign("vault opened at 08:00", "branch_office").unwrap();
    assert!(deployment.primary_client().signed_message(&envelope).unwrap());

    let mut forged = envelope.clone();
    forged.message = "vault opened at 03:00".to_string();
    assert!(!deployment.primary_client().signed_message(&forged).unwrap());
}
