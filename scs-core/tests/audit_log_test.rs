//! Audit log persistence tests
//!
//! Run with: cargo test --test audit_log_test -- --nocapture

use std::sync::Arc;

use tempfile::TempDir;

use scs_core::adapters::{DuckDbAuditLog, FileCredentialRepository, InMemoryCertificateStore};
use scs_core::domain::{subject_for, InstanceRole, Role};
use scs_core::ports::AuditSink;
use scs_core::services::{CredentialService, ReplicationPusher, SignedMessageChannel};
use scs_core::CertificateWithKey;

#[test]
fn test_events_survive_reopening() {
    let temp_dir = TempDir::new().unwrap();

    {
        let log = DuckDbAuditLog::open(temp_dir.path(), "primary").unwrap();
        log.record("User 'marko' created.").unwrap();
        log.record("ERROR: Replication of 'marko' to backup server 127.0.0.1:9998 failed").unwrap();
    }

    let log = DuckDbAuditLog::open(temp_dir.path(), "primary").unwrap();
    assert_eq!(log.count().unwrap(), 2);

    let errors = log.get_errors(10).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].event.starts_with("ERROR: Replication"));
    assert_eq!(errors[0].instance, "primary");
}

#[test]
fn test_each_component_has_its_own_database() {
    let temp_dir = TempDir::new().unwrap();

    let primary = DuckDbAuditLog::open(temp_dir.path(), "primary").unwrap();
    let gateway = DuckDbAuditLog::open(temp_dir.path(), "gateway").unwrap();
    primary.log_event("primary event");
    gateway.log_event("gateway event");
    gateway.log_event("ACCESS DENIED: attempt to list accounts");

    assert_eq!(primary.count().unwrap(), 1);
    assert_eq!(gateway.count().unwrap(), 2);
    assert_eq!(gateway.get_errors(10).unwrap().len(), 1);
    assert_ne!(primary.db_path(), gateway.db_path());
    assert!(temp_dir.path().join("audit-gateway.duckdb").exists());
}

#[test]
fn test_service_operations_are_audited() {
    let temp_dir = TempDir::new().unwrap();
    let audit = Arc::new(DuckDbAuditLog::open(temp_dir.path(), "primary").unwrap());
    let service = CredentialService::new(
        Arc::new(FileCredentialRepository::new(temp_dir.path().join("cards")).unwrap()),
        ReplicationPusher::disabled(InstanceRole::Primary, audit.clone()),
        SignedMessageChannel::new(Arc::new(InMemoryCertificateStore::new())),
        audit.clone(),
    );

    let mut manager = CertificateWithKey::generate("oib_manager", None);
    manager.certificate.subject = subject_for("oib_manager", Some(Role::Manager));
    let mut user = CertificateWithKey::generate("atm_client", None);
    user.certificate.subject = subject_for("atm_client", Some(Role::SmartCardUser));

    service
        .create_credential("marko", 1234, Some(&manager.presented_bytes().unwrap()))
        .unwrap();
    assert!(service
        .list_active_accounts(Some(&user.presented_bytes().unwrap()))
        .is_err());

    let recent = audit.get_recent(10).unwrap();
    assert!(recent.iter().any(|e| e.event.contains("marko") && !e.is_error));
    assert!(recent.iter().any(|e| e.event.starts_with("ACCESS DENIED") && e.is_error));
}
