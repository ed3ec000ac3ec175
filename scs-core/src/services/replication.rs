//! Replication pusher - best-effort primary to backup propagation
//!
//! Pushes are synchronous and at-most-once. The send timeout lives in the
//! peer endpoint (the HTTP client is built with the configured replication
//! timeout), so a stalled standby holds a write for at most that long.

use std::sync::Arc;

use crate::domain::{CredentialRecord, InstanceRole};
use crate::ports::{AuditSink, CredentialEndpoint};

/// What happened to one push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// The standby acknowledged the record
    Replicated,
    /// This instance is not the primary, so it never pushes
    Skipped,
    /// No peer configured
    NotConfigured,
    /// The push failed; the local write stands
    Failed(String),
}

impl ReplicationOutcome {
    pub fn is_replicated(&self) -> bool {
        matches!(self, ReplicationOutcome::Replicated)
    }
}

pub struct ReplicationPusher {
    role: InstanceRole,
    peer: Option<Arc<dyn CredentialEndpoint>>,
    peer_label: String,
    audit: Arc<dyn AuditSink>,
}

impl ReplicationPusher {
    /// Pusher towards `peer`, labelled with its address in audit messages
    pub fn new(
        role: InstanceRole,
        peer: Arc<dyn CredentialEndpoint>,
        peer_label: impl Into<String>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            role,
            peer: Some(peer),
            peer_label: peer_label.into(),
            audit,
        }
    }

    /// Pusher with no paired instance
    pub fn disabled(role: InstanceRole, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            role,
            peer: None,
            peer_label: String::new(),
            audit,
        }
    }

    pub fn role(&self) -> InstanceRole {
        self.role
    }

    /// Push a committed record to the standby
    ///
    /// Never returns an error; the outcome is audit-logged and handed back
    /// for callers that want to inspect it.
    pub fn replicate(&self, record: &CredentialRecord) -> ReplicationOutcome {
        if self.role != InstanceRole::Primary {
            return ReplicationOutcome::Skipped;
        }
        let Some(peer) = &self.peer else {
            return ReplicationOutcome::NotConfigured;
        };

        match peer.replicate(record, InstanceRole::Primary) {
            Ok(()) => {
                self.audit.log_event(&format!(
                    "Replication of '{}' to backup server {} succeeded.",
                    record.subject_name, self.peer_label
                ));
                ReplicationOutcome::Replicated
            }
            Err(e) => {
                tracing::warn!(
                    user = %record.subject_name,
                    peer = %self.peer_label,
                    error = %e,
                    "replication push failed"
                );
                self.audit.log_event(&format!(
                    "ERROR: Replication of '{}' to backup server {} failed: {}",
                    record.subject_name, self.peer_label, e
                ));
                ReplicationOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MemoryAuditSink, ScriptedEndpoint};
    use crate::domain::result::Error;
    use crate::domain::Pin;

    fn record() -> CredentialRecord {
        CredentialRecord::new("alice", Pin::new(4321).unwrap())
    }

    #[test]
    fn test_primary_pushes_with_primary_origin() {
        let audit = Arc::new(MemoryAuditSink::new());
        let peer = Arc::new(ScriptedEndpoint::healthy());
        let pusher = ReplicationPusher::new(InstanceRole::Primary, peer.clone(), "backup", audit.clone());

        assert_eq!(pusher.replicate(&record()), ReplicationOutcome::Replicated);
        assert_eq!(peer.replicas(), vec![(record(), InstanceRole::Primary)]);
        assert!(audit.contains("succeeded"));
    }

    #[test]
    fn test_backup_never_pushes() {
        let audit = Arc::new(MemoryAuditSink::new());
        let peer = Arc::new(ScriptedEndpoint::healthy());
        let pusher = ReplicationPusher::new(InstanceRole::Backup, peer.clone(), "primary", audit);

        assert_eq!(pusher.replicate(&record()), ReplicationOutcome::Skipped);
        assert!(peer.replicas().is_empty());
        assert_eq!(peer.calls(), 0);
    }

    #[test]
    fn test_failed_push_is_reported_not_raised() {
        let audit = Arc::new(MemoryAuditSink::new());
        let peer = Arc::new(ScriptedEndpoint::failing_with(|| Error::communication("connection refused")));
        let pusher = ReplicationPusher::new(InstanceRole::Primary, peer, "backup", audit.clone());

        let outcome = pusher.replicate(&record());
        assert!(matches!(outcome, ReplicationOutcome::Failed(ref m) if m.contains("connection refused")));
        assert!(audit.contains("ERROR: Replication"));
    }

    #[test]
    fn test_disabled_pusher() {
        let audit = Arc::new(MemoryAuditSink::new());
        let pusher = ReplicationPusher::disabled(InstanceRole::Primary, audit);
        assert_eq!(pusher.replicate(&record()), ReplicationOutcome::NotConfigured);
    }
}
