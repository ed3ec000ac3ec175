//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod audit;
mod certificate_store;
mod credential_endpoint;
mod record_store;

pub use audit::AuditSink;
pub use certificate_store::{CertificateStore, StoreContainer};
pub use credential_endpoint::CredentialEndpoint;
pub use record_store::CredentialRepository;
