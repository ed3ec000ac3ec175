//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod certificate;
mod credential;
pub mod encoding;
mod endpoint;
mod envelope;
mod instance;
mod ledger;
pub mod result;

pub use certificate::{subject_attribute, subject_for, Certificate, CertificateWithKey, Role};
pub use credential::{hash_pin, validate_username, CredentialRecord, Pin, MAX_PIN, MIN_PIN};
pub use endpoint::{Address, EndpointPair, Slot};
pub use envelope::SignedEnvelope;
pub use instance::InstanceRole;
pub use ledger::{AccountLedgerEntry, TransactionOutcome};
