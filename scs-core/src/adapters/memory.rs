//! In-memory adapters
//!
//! Record store, certificate store and audit sink that keep everything in
//! process memory. Used by tests and by `scs` commands that only need a
//! throwaway store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use crate::domain::result::{Error, Result};
use crate::domain::{Certificate, CertificateWithKey, CredentialRecord};
use crate::ports::{AuditSink, CertificateStore, CredentialRepository, StoreContainer};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialRepository {
    records: Mutex<BTreeMap<String, CredentialRecord>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialRepository for InMemoryCredentialRepository {
    fn get(&self, username: &str) -> Result<Option<CredentialRecord>> {
        Ok(lock(&self.records)?.get(username).cloned())
    }

    fn insert_new(&self, record: &CredentialRecord) -> Result<()> {
        let mut records = lock(&self.records)?;
        if records.contains_key(&record.subject_name) {
            return Err(Error::AlreadyExists(format!(
                "a smart card for user '{}' already exists",
                record.subject_name
            )));
        }
        records.insert(record.subject_name.clone(), record.clone());
        Ok(())
    }

    fn upsert(&self, record: &CredentialRecord) -> Result<()> {
        lock(&self.records)?.insert(record.subject_name.clone(), record.clone());
        Ok(())
    }

    fn list_subjects(&self) -> Result<Vec<String>> {
        Ok(lock(&self.records)?.keys().cloned().collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCertificateStore {
    certificates: Mutex<HashMap<StoreContainer, Vec<CertificateWithKey>>>,
}

impl InMemoryCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CertificateStore for InMemoryCertificateStore {
    fn lookup_certificate(&self, subject_name: &str) -> Result<Option<CertificateWithKey>> {
        let certificates = lock(&self.certificates)?;
        Ok(certificates
            .get(&StoreContainer::Personal)
            .and_then(|certs| {
                certs
                    .iter()
                    .find(|c| matches_subject(&c.certificate, subject_name))
            })
            .cloned())
    }

    fn lookup_certificate_by_subject_exact(
        &self,
        container: StoreContainer,
        subject_name: &str,
    ) -> Result<Option<Certificate>> {
        let certificates = lock(&self.certificates)?;
        Ok(certificates
            .get(&container)
            .and_then(|certs| {
                certs
                    .iter()
                    .find(|c| matches_subject(&c.certificate, subject_name))
            })
            .map(|c| c.certificate.clone()))
    }

    fn install(&self, container: StoreContainer, certificate: &CertificateWithKey) -> Result<()> {
        let mut stored = certificate.clone();
        if container == StoreContainer::TrustedPeople {
            stored.signing_key.clear();
        }
        let mut certificates = lock(&self.certificates)?;
        let certs = certificates.entry(container).or_default();
        certs.retain(|c| c.certificate.subject != stored.certificate.subject);
        certs.push(stored);
        Ok(())
    }

    fn list(&self, container: StoreContainer) -> Result<Vec<Certificate>> {
        let certificates = lock(&self.certificates)?;
        Ok(certificates
            .get(&container)
            .map(|certs| certs.iter().map(|c| c.certificate.clone()).collect())
            .unwrap_or_default())
    }
}

/// Exact match on the common name, or on the whole subject
pub(crate) fn matches_subject(certificate: &Certificate, subject_name: &str) -> bool {
    certificate.common_name() == Some(subject_name) || certificate.subject == subject_name
}

/// Audit sink that keeps events in memory
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<String>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// True if any recorded event contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.events().iter().any(|e| e.contains(needle))
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_event(&self, message: &str) {
        if let Ok(mut events) = self.events.lock() {
            events.push(message.to_string());
        }
    }
}

/// Audit sink that forwards events to `tracing`
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink {
    instance: String,
}

impl TracingAuditSink {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }
}

impl AuditSink for TracingAuditSink {
    fn log_event(&self, message: &str) {
        tracing::info!(target: "scs::audit", instance = %self.instance, "{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Pin, Role};

    #[test]
    fn test_repository_lists_sorted() {
        let repo = InMemoryCredentialRepository::new();
        repo.upsert(&CredentialRecord::new("zed", Pin::new(1000).unwrap())).unwrap();
        repo.insert_new(&CredentialRecord::new("amy", Pin::new(1000).unwrap())).unwrap();
        assert_eq!(repo.list_subjects().unwrap(), vec!["amy", "zed"]);
        assert!(repo
            .insert_new(&CredentialRecord::new("amy", Pin::new(2000).unwrap()))
            .is_err());
    }

    #[test]
    fn test_trusted_people_drop_private_keys() {
        let store = InMemoryCertificateStore::new();
        let issued = CertificateWithKey::generate("peer", Some(Role::Manager));
        store.install(StoreContainer::TrustedPeople, &issued).unwrap();

        assert!(store.lookup_certificate("peer").unwrap().is_none());
        let found = store
            .lookup_certificate_by_subject_exact(StoreContainer::TrustedPeople, "peer")
            .unwrap()
            .unwrap();
        assert_eq!(found, issued.certificate);
    }

    #[test]
    fn test_exact_lookup_does_not_match_prefixes() {
        let store = InMemoryCertificateStore::new();
        store
            .install(StoreContainer::Personal, &CertificateWithKey::generate("oib_manager", None))
            .unwrap();
        assert!(store
            .lookup_certificate_by_subject_exact(StoreContainer::Personal, "oib")
            .unwrap()
            .is_none());
        assert!(store.lookup_certificate("oib_manager").unwrap().is_some());
    }

    #[test]
    fn test_memory_audit_sink() {
        let sink = MemoryAuditSink::new();
        sink.log_event("SmartCard created");
        assert!(sink.contains("created"));
        assert_eq!(sink.events().len(), 1);
    }
}
