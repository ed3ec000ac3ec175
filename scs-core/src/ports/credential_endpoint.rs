//! Credential service endpoint port
//!
//! The operations a caller can invoke on one credential service instance,
//! whether it lives in-process or behind the network. Remote
//! implementations report transport problems as `Error::Communication`
//! and everything the service itself answered as the matching typed error,
//! which is what lets the failover connector tell the two apart.

use std::sync::Arc;

use crate::domain::result::Result;
use crate::domain::{CredentialRecord, InstanceRole, SignedEnvelope};

pub trait CredentialEndpoint: Send + Sync {
    /// Liveness probe
    fn ping(&self) -> Result<()>;

    /// Round trip that also checks the caller may use the service
    fn test_communication(&self, caller_cert: Option<&[u8]>) -> Result<()>;

    fn create_credential(&self, username: &str, pin: u32, caller_cert: Option<&[u8]>) -> Result<()>;

    /// `Ok(false)` for an unknown user or a wrong PIN alike
    fn validate_pin(&self, username: &str, pin: u32) -> Result<bool>;

    fn rotate_pin(
        &self,
        username: &str,
        old_pin: u32,
        new_pin: u32,
        caller_cert: Option<&[u8]>,
    ) -> Result<()>;

    fn list_active_accounts(&self, caller_cert: Option<&[u8]>) -> Result<Vec<String>>;

    /// Store a record written on the paired instance
    fn replicate(&self, record: &CredentialRecord, origin: InstanceRole) -> Result<()>;

    /// Deliver a signed message; `Ok(false)` when the signature does not verify
    fn signed_message(&self, envelope: &SignedEnvelope) -> Result<bool>;
}

impl<T: CredentialEndpoint + ?Sized> CredentialEndpoint for Arc<T> {
    fn ping(&self) -> Result<()> {
        (**self).ping()
    }

    fn test_communication(&self, caller_cert: Option<&[u8]>) -> Result<()> {
        (**self).test_communication(caller_cert)
    }

    fn create_credential(&self, username: &str, pin: u32, caller_cert: Option<&[u8]>) -> Result<()> {
        (**self).create_credential(username, pin, caller_cert)
    }

    fn validate_pin(&self, username: &str, pin: u32) -> Result<bool> {
        (**self).validate_pin(username, pin)
    }

    fn rotate_pin(
        &self,
        username: &str,
        old_pin: u32,
        new_pin: u32,
        caller_cert: Option<&[u8]>,
    ) -> Result<()> {
        (**self).rotate_pin(username, old_pin, new_pin, caller_cert)
    }

    fn list_active_accounts(&self, caller_cert: Option<&[u8]>) -> Result<Vec<String>> {
        (**self).list_active_accounts(caller_cert)
    }

    fn replicate(&self, record: &CredentialRecord, origin: InstanceRole) -> Result<()> {
        (**self).replicate(record, origin)
    }

    fn signed_message(&self, envelope: &SignedEnvelope) -> Result<bool> {
        (**self).signed_message(envelope)
    }
}
