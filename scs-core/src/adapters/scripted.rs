//! Scripted credential endpoint for failure injection
//!
//! Wraps an optional real endpoint and can be switched "down" at any time,
//! at which point every call fails with the scripted error (a
//! communication failure unless told otherwise). Counts calls so tests can
//! assert which endpoint a failover connector actually hit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::result::{Error, Result};
use crate::domain::{CredentialRecord, InstanceRole, SignedEnvelope};
use crate::ports::CredentialEndpoint;

type FailureFn = Arc<dyn Fn() -> Error + Send + Sync>;

pub struct ScriptedEndpoint {
    inner: Option<Arc<dyn CredentialEndpoint>>,
    failure: Mutex<Option<FailureFn>>,
    calls: AtomicUsize,
    replicas: Mutex<Vec<(CredentialRecord, InstanceRole)>>,
}

impl ScriptedEndpoint {
    /// Endpoint that answers everything with empty successes
    pub fn healthy() -> Self {
        Self {
            inner: None,
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
            replicas: Mutex::new(Vec::new()),
        }
    }

    /// Endpoint that forwards to `inner` while up
    pub fn backed_by(inner: Arc<dyn CredentialEndpoint>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::healthy()
        }
    }

    /// Endpoint that fails every call with `failure()`
    pub fn failing_with(failure: impl Fn() -> Error + Send + Sync + 'static) -> Self {
        let endpoint = Self::healthy();
        endpoint.fail_with(failure);
        endpoint
    }

    /// Unreachable endpoint
    pub fn down() -> Self {
        let endpoint = Self::healthy();
        endpoint.go_down();
        endpoint
    }

    pub fn fail_with(&self, failure: impl Fn() -> Error + Send + Sync + 'static) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(failure));
    }

    pub fn go_down(&self) {
        self.fail_with(|| Error::communication("connection refused (scripted)"));
    }

    pub fn come_up(&self) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Number of calls received, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Replicas received while up
    pub fn replicas(&self) -> Vec<(CredentialRecord, InstanceRole)> {
        self.replicas.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn enter(&self) -> Result<Option<&Arc<dyn CredentialEndpoint>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone();
        match failure {
            Some(make_error) => Err(make_error()),
            None => Ok(self.inner.as_ref()),
        }
    }
}

impl CredentialEndpoint for ScriptedEndpoint {
    fn ping(&self) -> Result<()> {
        match self.enter()? {
            Some(inner) => inner.ping(),
            None => Ok(()),
        }
    }

    fn test_communication(&self, caller_cert: Option<&[u8]>) -> Result<()> {
        match self.enter()? {
            Some(inner) => inner.test_communication(caller_cert),
            None => Ok(()),
        }
    }

    fn create_credential(&self, username: &str, pin: u32, caller_cert: Option<&[u8]>) -> Result<()> {
        match self.enter()? {
            Some(inner) => inner.create_credential(username, pin, caller_cert),
            None => Ok(()),
        }
    }

    fn validate_pin(&self, username: &str, pin: u32) -> Result<bool> {
        match self.enter()? {
            Some(inner) => inner.validate_pin(username, pin),
            None => Ok(false),
        }
    }

    fn rotate_pin(
        &self,
        username: &str,
        old_pin: u32,
        new_pin: u32,
        caller_cert: Option<&[u8]>,
    ) -> Result<()> {
        match self.enter()? {
            Some(inner) => inner.rotate_pin(username, old_pin, new_pin, caller_cert),
            None => Ok(()),
        }
    }

    fn list_active_accounts(&self, caller_cert: Option<&[u8]>) -> Result<Vec<String>> {
        match self.enter()? {
            Some(inner) => inner.list_active_accounts(caller_cert),
            None => Ok(Vec::new()),
        }
    }

    fn replicate(&self, record: &CredentialRecord, origin: InstanceRole) -> Result<()> {
        let inner = self.enter()?;
        self.replicas
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((record.clone(), origin));
        match inner {
            Some(inner) => inner.replicate(record, origin),
            None => Ok(()),
        }
    }

    fn signed_message(&self, envelope: &SignedEnvelope) -> Result<bool> {
        match self.enter()? {
            Some(inner) => inner.signed_message(envelope),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_down_endpoint_fails_with_communication_error() {
        let endpoint = ScriptedEndpoint::down();
        let err = endpoint.ping().unwrap_err();
        assert!(err.is_communication());
        assert_eq!(endpoint.calls(), 1);

        endpoint.come_up();
        assert!(endpoint.ping().is_ok());
        assert_eq!(endpoint.calls(), 2);
    }

    #[test]
    fn test_custom_failure() {
        let endpoint = ScriptedEndpoint::failing_with(|| Error::access_denied("nope"));
        assert!(matches!(endpoint.list_active_accounts(None), Err(Error::AccessDenied(_))));
    }
}
