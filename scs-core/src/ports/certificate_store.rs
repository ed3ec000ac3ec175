//! Certificate store port

use std::fmt;

use crate::domain::result::Result;
use crate::domain::{Certificate, CertificateWithKey};

/// Container inside a certificate store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreContainer {
    /// Certificates owned by this machine, with private keys
    Personal,
    /// Public certificates of known peers
    TrustedPeople,
}

impl StoreContainer {
    pub fn dir_name(&self) -> &'static str {
        match self {
            StoreContainer::Personal => "My",
            StoreContainer::TrustedPeople => "TrustedPeople",
        }
    }
}

impl fmt::Display for StoreContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Lookup of certificates by subject
pub trait CertificateStore: Send + Sync {
    /// Personal certificate (with private key) whose common name is `subject_name`
    fn lookup_certificate(&self, subject_name: &str) -> Result<Option<CertificateWithKey>>;

    /// Certificate in `container` whose common name is exactly `subject_name`
    fn lookup_certificate_by_subject_exact(
        &self,
        container: StoreContainer,
        subject_name: &str,
    ) -> Result<Option<Certificate>>;

    /// Add a certificate; trusted containers only keep the public part
    fn install(&self, container: StoreContainer, certificate: &CertificateWithKey) -> Result<()>;

    /// All certificates in a container
    fn list(&self, container: StoreContainer) -> Result<Vec<Certificate>>;
}
