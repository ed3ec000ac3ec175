//! Credential store tests against the on-disk record directory
//!
//! Run with: cargo test --test credential_store_test -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;

use scs_core::adapters::{FileCredentialRepository, InMemoryCertificateStore, MemoryAuditSink};
use scs_core::domain::{hash_pin, subject_for, InstanceRole, Role};
use scs_core::ports::CredentialRepository;
use scs_core::services::{CredentialService, ReplicationPusher, SignedMessageChannel};
use scs_core::{CertificateWithKey, Error};

/// Number of concurrent writers in contention tests
const THREAD_COUNT: usize = 6;

fn presented(name: &str, role: Role) -> Vec<u8> {
    let mut issued = CertificateWithKey::generate(name, None);
    issued.certificate.subject = subject_for(name, Some(role));
    issued.presented_bytes().unwrap()
}

fn service_over(dir: &std::path::Path) -> (CredentialService, Arc<MemoryAuditSink>) {
    let repository = Arc::new(FileCredentialRepository::new(dir).unwrap());
    let audit = Arc::new(MemoryAuditSink::new());
    let service = CredentialService::new(
        repository,
        ReplicationPusher::disabled(InstanceRole::Primary, audit.clone()),
        SignedMessageChannel::new(Arc::new(InMemoryCertificateStore::new())),
        audit.clone(),
    );
    (service, audit)
}

#[test]
fn test_records_survive_a_restart() {
    let temp_dir = TempDir::new().unwrap();
    let manager = presented("oib_manager", Role::Manager);

    {
        let (service, _) = service_over(temp_dir.path());
        service.create_credential("marko", 1234, Some(&manager)).unwrap();
        service.create_credential("ana", 4321, Some(&manager)).unwrap();
    }

    let (service, _) = service_over(temp_dir.path());
    assert!(service.validate_pin("marko", 1234).unwrap());
    assert!(!service.validate_pin("marko", 4321).unwrap());
    assert_eq!(
        service.list_active_accounts(Some(&manager)).unwrap(),
        vec!["ana".to_string(), "marko".to_string()]
    );
}

#[test]
fn test_stored_record_holds_only_the_hash() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _) = service_over(temp_dir.path());
    let user = presented("atm_client", Role::SmartCardUser);

    service.create_credential("marko", 1234, Some(&user)).unwrap();

    let raw = std::fs::read_to_string(temp_dir.path().join("marko.json")).unwrap();
    assert!(raw.contains(&hash_pin(1234)));
    assert!(!raw.contains("\"1234\""));
}

#[test]
fn test_rotated_pin_replaces_the_old_one() {
    let temp_dir = TempDir::new().unwrap();
    let (service, audit) = service_over(temp_dir.path());
    let user = presented("atm_client", Role::SmartCardUser);

    service.create_credential("marko", 1234, Some(&user)).unwrap();
    service.rotate_pin("marko", 1234, 5678, Some(&user)).unwrap();

    assert!(service.validate_pin("marko", 5678).unwrap());
    assert!(!service.validate_pin("marko", 1234).unwrap());

    let err = service.rotate_pin("marko", 1234, 9999, Some(&user)).unwrap_err();
    assert!(matches!(err, Error::AuthenticationFailed(_)));
    assert!(service.validate_pin("marko", 5678).unwrap());
    assert!(audit.events().iter().any(|e| e.contains("marko")));
}

#[test]
fn test_unauthorized_caller_writes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let (service, audit) = service_over(temp_dir.path());
    let stranger = presented("intruder", Role::Unauthorized);

    let err = service.create_credential("marko", 1234, Some(&stranger)).unwrap_err();
    assert!(err.is_authorization());
    assert!(matches!(
        service.create_credential("marko", 1234, None),
        Err(Error::InvalidCertificate(_))
    ));

    let repository = FileCredentialRepository::new(temp_dir.path()).unwrap();
    assert!(repository.list_subjects().unwrap().is_empty());
    assert!(audit.contains("ACCESS DENIED"));
}

/// Separate repository instances over one directory, all creating the same
/// user at once: the directory lock must let exactly one of them win.
#[test]
fn test_concurrent_creates_of_one_user() {
    let temp_dir = TempDir::new().unwrap();
    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let created = Arc::new(AtomicUsize::new(0));
    let duplicates = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|i| {
            let dir = temp_dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            let created = Arc::clone(&created);
            let duplicates = Arc::clone(&duplicates);
            thread::spawn(move || {
                let (service, _) = service_over(&dir);
                let user = presented("atm_client", Role::SmartCardUser);
                barrier.wait();
                match service.create_credential("marko", 1000 + i as u32, Some(&user)) {
                    Ok(()) => created.fetch_add(1, Ordering::SeqCst),
                    Err(Error::AlreadyExists(_)) => duplicates.fetch_add(1, Ordering::SeqCst),
                    Err(e) => panic!("thread {} failed: {}", i, e),
                };
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(duplicates.load(Ordering::SeqCst), THREAD_COUNT - 1);

    let repository = FileCredentialRepository::new(temp_dir.path()).unwrap();
    assert_eq!(repository.list_subjects().unwrap(), vec!["marko".to_string()]);
    assert!(repository.get("marko").unwrap().unwrap().validate().is_ok());
}

/// Concurrent rotations from the same old PIN: only one may succeed
#[test]
fn test_concurrent_rotations_from_one_old_pin() {
    let temp_dir = TempDir::new().unwrap();
    let (service, _) = service_over(temp_dir.path());
    let service = Arc::new(service);
    let user = presented("atm_client", Role::SmartCardUser);
    service.create_credential("marko", 1234, Some(&user)).unwrap();

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let rotated = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..THREAD_COUNT)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            let rotated = Arc::clone(&rotated);
            let user = user.clone();
            thread::spawn(move || {
                barrier.wait();
                if service
                    .rotate_pin("marko", 1234, 2000 + i as u32, Some(&user))
                    .is_ok()
                {
                    rotated.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(rotated.load(Ordering::SeqCst), 1);
    assert!(!service.validate_pin("marko", 1234).unwrap());
}
