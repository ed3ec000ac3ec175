//! Credential record store port

use crate::domain::result::Result;
use crate::domain::CredentialRecord;

/// Durable per-user credential storage
///
/// The store knows nothing about PINs or roles; it keeps one named record
/// per subject. `insert_new` must be atomic with respect to other writers
/// so that two concurrent creates for the same user cannot both succeed.
pub trait CredentialRepository: Send + Sync {
    /// Get the record for a subject, if any
    fn get(&self, subject_name: &str) -> Result<Option<CredentialRecord>>;

    /// Insert a record that must not exist yet (`AlreadyExists` otherwise)
    fn insert_new(&self, record: &CredentialRecord) -> Result<()>;

    /// Insert or overwrite a record
    fn upsert(&self, record: &CredentialRecord) -> Result<()>;

    /// Subjects with a stored record, sorted
    fn list_subjects(&self) -> Result<Vec<String>>;
}
