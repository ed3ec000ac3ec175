//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - JSON files per user for the CredentialRepository port
//! - A certificate directory for the CertificateStore port
//! - DuckDB for the AuditSink port
//! - HTTP (axum server, reqwest client) for CredentialEndpoint
//! - In-memory and scripted variants for tests

mod cert_store;
mod duckdb_audit;
mod file_store;
pub mod http;
mod memory;
mod scripted;

pub use cert_store::DirectoryCertificateStore;
pub use duckdb_audit::{AuditEntry, DuckDbAuditLog};
pub use file_store::FileCredentialRepository;
pub use memory::{InMemoryCertificateStore, InMemoryCredentialRepository, MemoryAuditSink, TracingAuditSink};
pub use scripted::ScriptedEndpoint;
