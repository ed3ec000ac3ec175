//! Directory-backed certificate store
//!
//! Layout: `<root>/My/<name>.json` holds a certificate together with its
//! private key, `<root>/TrustedPeople/<name>.json` holds public
//! certificates only. `<name>` is the certificate's common name.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::domain::result::{Error, Result};
use crate::domain::{validate_username, Certificate, CertificateWithKey};
use crate::ports::{CertificateStore, StoreContainer};

use super::memory::matches_subject;

#[derive(Debug, Clone)]
pub struct DirectoryCertificateStore {
    root: PathBuf,
}

impl DirectoryCertificateStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for container in [StoreContainer::Personal, StoreContainer::TrustedPeople] {
            let dir = root.join(container.dir_name());
            fs::create_dir_all(&dir).map_err(|e| {
                Error::storage(format!("cannot create certificate store {}: {}", dir.display(), e))
            })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn container_dir(&self, container: StoreContainer) -> PathBuf {
        self.root.join(container.dir_name())
    }

    fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map(Some).map_err(|e| {
                Error::InvalidCertificate(format!("cannot parse {}: {}", path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(format!("cannot read {}: {}", path.display(), e))),
        }
    }

    /// Find by file name first, then fall back to scanning for a full-subject match
    fn find<T, F>(&self, container: StoreContainer, subject_name: &str, cert_of: F) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> &Certificate,
    {
        let dir = self.container_dir(container);
        if validate_username(subject_name).is_ok() {
            let direct = Self::read::<T>(&dir.join(format!("{}.json", subject_name)))?;
            if let Some(found) = direct {
                if matches_subject(cert_of(&found), subject_name) {
                    return Ok(Some(found));
                }
            }
        }

        for path in json_files(&dir)? {
            if let Some(found) = Self::read::<T>(&path)? {
                if matches_subject(cert_of(&found), subject_name) {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl CertificateStore for DirectoryCertificateStore {
    fn lookup_certificate(&self, subject_name: &str) -> Result<Option<CertificateWithKey>> {
        self.find(StoreContainer::Personal, subject_name, |c: &CertificateWithKey| {
            &c.certificate
        })
    }

    fn lookup_certificate_by_subject_exact(
        &self,
        container: StoreContainer,
        subject_name: &str,
    ) -> Result<Option<Certificate>> {
        // Personal files carry the key as an extra field; it is ignored here
        self.find(container, subject_name, |c: &Certificate| c)
    }

    fn install(&self, container: StoreContainer, certificate: &CertificateWithKey) -> Result<()> {
        let name = certificate.certificate.common_name().ok_or_else(|| {
            Error::InvalidCertificate(format!(
                "certificate '{}' has no CN to file it under",
                certificate.certificate.subject
            ))
        })?;
        validate_username(name)?;

        let path = self.container_dir(container).join(format!("{}.json", name));
        let json = match container {
            StoreContainer::Personal => serde_json::to_string_pretty(certificate)?,
            StoreContainer::TrustedPeople => serde_json::to_string_pretty(&certificate.certificate)?,
        };
        fs::write(&path, json)
            .map_err(|e| Error::storage(format!("cannot write {}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "certificate installed");
        Ok(())
    }

    fn list(&self, container: StoreContainer) -> Result<Vec<Certificate>> {
        let mut certificates = Vec::new();
        for path in json_files(&self.container_dir(container))? {
            if let Some(cert) = Self::read::<Certificate>(&path)? {
                certificates.push(cert);
            }
        }
        Ok(certificates)
    }
}
