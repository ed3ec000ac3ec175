//! Credential service - smart card records behind certificate-based authorization
//!
//! Composes the record store, the authorization guard, the replication
//! pusher and the signed message channel. Holds no per-caller state.

use std::sync::{Arc, Mutex};

use crate::domain::result::{Error, Result};
use crate::domain::{validate_username, CredentialRecord, InstanceRole, Pin, Role, SignedEnvelope};
use crate::ports::{AuditSink, CredentialEndpoint, CredentialRepository};

use super::authorization::{AuthorizationGuard, Caller, CARD_HOLDER_ROLES};
use super::replication::{ReplicationOutcome, ReplicationPusher};
use super::signing::SignedMessageChannel;

pub struct CredentialService {
    repository: Arc<dyn CredentialRepository>,
    guard: AuthorizationGuard,
    replication: ReplicationPusher,
    channel: SignedMessageChannel,
    audit: Arc<dyn AuditSink>,
    /// Serializes read-check-write in `rotate_pin`
    rotation: Mutex<()>,
}

impl CredentialService {
    pub fn new(
        repository: Arc<dyn CredentialRepository>,
        replication: ReplicationPusher,
        channel: SignedMessageChannel,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            repository,
            guard: AuthorizationGuard::new(),
            replication,
            channel,
            audit,
            rotation: Mutex::new(()),
        }
    }

    pub fn instance_role(&self) -> InstanceRole {
        self.replication.role()
    }

    pub fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Authorized round trip for clients checking their setup
    pub fn test_communication(&self, caller_cert: Option<&[u8]>) -> Result<()> {
        let caller = self.authorize(caller_cert, CARD_HOLDER_ROLES, "test communication")?;
        self.audit.log_event(&format!(
            "Communication test from '{}' succeeded.",
            caller.subject
        ));
        Ok(())
    }

    /// Create a smart card record for `username`
    pub fn create_credential(&self, username: &str, pin: u32, caller_cert: Option<&[u8]>) -> Result<()> {
        self.authorize(caller_cert, CARD_HOLDER_ROLES, "create a smart card")?;
        validate_username(username)?;
        let pin = Pin::new(pin)?;

        let record = CredentialRecord::new(username, pin);
        if let Err(e) = self.repository.insert_new(&record) {
            if matches!(e, Error::AlreadyExists(_)) {
                self.audit.log_event(&format!(
                    "ERROR: SmartCard for user '{}' already exists.",
                    username
                ));
            }
            return Err(e);
        }

        tracing::info!(user = username, "smart card created");
        self.audit.log_event(&format!(
            "SmartCard for user '{}' created successfully.",
            username
        ));
        self.push(&record);
        Ok(())
    }

    /// Check a PIN; unknown users and wrong PINs both answer false
    pub fn validate_pin(&self, username: &str, pin: u32) -> Result<bool> {
        let valid = match self.repository.get(username)? {
            Some(record) => record.matches(pin),
            None => false,
        };
        if valid {
            self.audit.log_event(&format!("PIN validated for user '{}'.", username));
        } else {
            self.audit.log_event(&format!(
                "ERROR: PIN validation failed for user '{}'.",
                username
            ));
        }
        Ok(valid)
    }

    /// Replace the PIN of `username` after checking the old one
    pub fn rotate_pin(
        &self,
        username: &str,
        old_pin: u32,
        new_pin: u32,
        caller_cert: Option<&[u8]>,
    ) -> Result<()> {
        self.authorize(caller_cert, CARD_HOLDER_ROLES, "change a PIN")?;
        let new_pin = Pin::new(new_pin)?;

        let record = {
            let _guard = self
                .rotation
                .lock()
                .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;

            let current = self.repository.get(username)?;
            if !current.map(|r| r.matches(old_pin)).unwrap_or(false) {
                self.audit.log_event(&format!(
                    "ERROR: PIN change refused for user '{}': wrong username or PIN.",
                    username
                ));
                return Err(Error::AuthenticationFailed(format!(
                    "invalid username or PIN for '{}'",
                    username
                )));
            }

            let record = CredentialRecord::new(username, new_pin);
            self.repository.upsert(&record)?;
            record
        };

        tracing::info!(user = username, "PIN rotated");
        self.audit.log_event(&format!("PIN for user '{}' changed successfully.", username));
        self.push(&record);
        Ok(())
    }

    /// Usernames of all records, sorted; managers only
    pub fn list_active_accounts(&self, caller_cert: Option<&[u8]>) -> Result<Vec<String>> {
        self.audit_refusal(self.guard.authorize_manager(caller_cert), "list all accounts")?;
        let subjects = self.repository.list_subjects()?;
        self.audit.log_event(&format!(
            "Active account list served ({} accounts).",
            subjects.len()
        ));
        Ok(subjects)
    }

    /// Store a record pushed by the primary
    ///
    /// Applied verbatim and never pushed onwards.
    pub fn apply_replica(&self, record: &CredentialRecord, origin: InstanceRole) -> Result<()> {
        if origin != InstanceRole::Primary {
            return Err(Error::validation(format!(
                "replica for '{}' came from a {} instance; only a primary replicates",
                record.subject_name, origin
            )));
        }
        validate_username(&record.subject_name)?;
        record.validate()?;

        self.repository.upsert(record)?;
        tracing::debug!(user = %record.subject_name, "replica applied");
        self.audit.log_event(&format!(
            "Replica for user '{}' stored (origin {}).",
            record.subject_name, origin
        ));
        Ok(())
    }

    /// Verify a signed message and log what was received
    pub fn receive_signed_message(&self, envelope: &SignedEnvelope) -> bool {
        let verified = self.channel.verify_envelope(envelope);
        if verified {
            self.audit.log_event(&format!(
                "Signed message from '{}' verified: {}",
                envelope.sender_name, envelope.message
            ));
        } else {
            self.audit.log_event(&format!(
                "ERROR: Signed message from '{}' failed verification.",
                envelope.sender_name
            ));
        }
        verified
    }

    fn authorize(
        &self,
        caller_cert: Option<&[u8]>,
        allowed: &[Role],
        action: &str,
    ) -> Result<Caller> {
        self.audit_refusal(self.guard.authorize_caller(caller_cert, allowed), action)
    }

    fn audit_refusal(&self, checked: Result<Caller>, action: &str) -> Result<Caller> {
        checked.map_err(|e| {
            tracing::warn!(action, error = %e, "authorization refused");
            self.audit
                .log_event(&format!("ACCESS DENIED: attempt to {}: {}", action, e.detail()));
            e
        })
    }

    fn push(&self, record: &CredentialRecord) {
        if let ReplicationOutcome::Failed(reason) = self.replication.replicate(record) {
            tracing::debug!(user = %record.subject_name, reason = %reason, "write kept without replica");
        }
    }
}

impl CredentialEndpoint for CredentialService {
    fn ping(&self) -> Result<()> {
        CredentialService::ping(self)
    }

    fn test_communication(&self, caller_cert: Option<&[u8]>) -> Result<()> {
        CredentialService::test_communication(self, caller_cert)
    }

    fn create_credential(&self, username: &str, pin: u32, caller_cert: Option<&[u8]>) -> Result<()> {
        CredentialService::create_credential(self, username, pin, caller_cert)
    }

    fn validate_pin(&self, username: &str, pin: u32) -> Result<bool> {
        CredentialService::validate_pin(self, username, pin)
    }

    fn rotate_pin(
        &self,
        username: &str,
        old_pin: u32,
        new_pin: u32,
        caller_cert: Option<&[u8]>,
    ) -> Result<()> {
        CredentialService::rotate_pin(self, username, old_pin, new_pin, caller_cert)
    }

    fn list_active_accounts(&self, caller_cert: Option<&[u8]>) -> Result<Vec<String>> {
        CredentialService::list_active_accounts(self, caller_cert)
    }

    fn replicate(&self, record: &CredentialRecord, origin: InstanceRole) -> Result<()> {
        self.apply_replica(record, origin)
    }

    fn signed_message(&self, envelope: &SignedEnvelope) -> Result<bool> {
        Ok(self.receive_signed_message(envelope))
    }
}
