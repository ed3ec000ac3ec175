//! Failover connector - two-endpoint client-side router
//!
//! Calls go to the current endpoint. A communication failure flips to the
//! other endpoint and retries exactly once; the flip sticks for later
//! calls. Application-level answers, errors included, pass through
//! untouched and never flip.
//!
//! `call` takes `&mut self`: one connector serves one caller at a time and
//! sharing it across threads needs a lock around it.

use crate::domain::result::{Error, Result};
use crate::domain::{Address, EndpointPair, Slot};

pub struct FailoverConnector<E> {
    endpoints: EndpointPair,
    primary: E,
    backup: E,
    current: Slot,
}

impl<E> FailoverConnector<E> {
    /// Connector starting on the primary
    pub fn new(endpoints: EndpointPair, primary: E, backup: E) -> Self {
        Self {
            endpoints,
            primary,
            backup,
            current: Slot::Primary,
        }
    }

    /// Build both endpoint handles from their addresses
    pub fn connect<F>(endpoints: EndpointPair, mut open: F) -> Result<Self>
    where
        F: FnMut(&Address) -> Result<E>,
    {
        let primary = open(&endpoints.primary)?;
        let backup = open(&endpoints.backup)?;
        Ok(Self::new(endpoints, primary, backup))
    }

    pub fn current(&self) -> Slot {
        self.current
    }

    pub fn current_address(&self) -> &Address {
        self.endpoints.address(self.current)
    }

    pub fn endpoints(&self) -> &EndpointPair {
        &self.endpoints
    }

    fn endpoint(&self, slot: Slot) -> &E {
        match slot {
            Slot::Primary => &self.primary,
            Slot::Backup => &self.backup,
        }
    }

    /// Run `operation` against the current endpoint, failing over once
    pub fn call<T, F>(&mut self, mut operation: F) -> Result<T>
    where
        F: FnMut(&E) -> Result<T>,
    {
        let first = self.current;
        let err = match operation(self.endpoint(first)) {
            Err(e) if e.is_communication() => e,
            answered => return answered,
        };

        let second = first.other();
        tracing::warn!(
            from = %self.endpoints.address(first),
            to = %self.endpoints.address(second),
            error = %err,
            "credential endpoint unreachable, switching"
        );
        self.current = second;

        match operation(self.endpoint(second)) {
            Err(e) if e.is_communication() => {
                tracing::error!(error = %e, "both credential endpoints unreachable");
                Err(Error::endpoints_unavailable(
                    self.endpoints.primary.as_str(),
                    self.endpoints.backup.as_str(),
                    &e,
                ))
            }
            answered => answered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ScriptedEndpoint;
    use crate::ports::CredentialEndpoint;

    fn pair() -> EndpointPair {
        EndpointPair::new(
            Address::new("127.0.0.1:9999").unwrap(),
            Address::new("127.0.0.1:9998").unwrap(),
        )
    }

    #[test]
    fn test_healthy_primary_is_used() {
        let mut connector = FailoverConnector::new(pair(), ScriptedEndpoint::healthy(), ScriptedEndpoint::down());
        connector.call(|e| e.ping()).unwrap();

        assert_eq!(connector.current(), Slot::Primary);
        assert_eq!(connector.primary.calls(), 1);
        assert_eq!(connector.backup.calls(), 0);
    }

    #[test]
    fn test_fails_over_and_stays_on_backup() {
        let mut connector = FailoverConnector::new(pair(), ScriptedEndpoint::down(), ScriptedEndpoint::healthy());

        connector.call(|e| e.ping()).unwrap();
        assert_eq!(connector.current(), Slot::Backup);
        assert_eq!(connector.current_address().as_str(), "127.0.0.1:9998");

        connector.call(|e| e.ping()).unwrap();
        assert_eq!(connector.primary.calls(), 1);
        assert_eq!(connector.backup.calls(), 2);
    }

    #[test]
    fn test_both_down_is_endpoints_unavailable() {
        let mut connector = FailoverConnector::new(pair(), ScriptedEndpoint::down(), ScriptedEndpoint::down());
        let err = connector.call(|e| e.validate_pin("alice", 1234)).unwrap_err();

        assert!(matches!(err, Error::EndpointsUnavailable(_)));
        let message = err.to_string();
        assert!(message.contains("127.0.0.1:9999"));
        assert!(message.contains("127.0.0.1:9998"));
        assert_eq!(connector.primary.calls(), 1);
        assert_eq!(connector.backup.calls(), 1);
    }

    #[test]
    fn test_application_errors_do_not_fail_over() {
        let mut connector = FailoverConnector::new(
            pair(),
            ScriptedEndpoint::failing_with(|| Error::access_denied("not a manager")),
            ScriptedEndpoint::healthy(),
        );
        let err = connector.call(|e| e.list_active_accounts(None)).unwrap_err();

        assert!(matches!(err, Error::AccessDenied(_)));
        assert_eq!(connector.current(), Slot::Primary);
        assert_eq!(connector.backup.calls(), 0);
    }

    #[test]
    fn test_recovers_back_to_primary_when_backup_dies() {
        let mut connector = FailoverConnector::new(pair(), ScriptedEndpoint::down(), ScriptedEndpoint::healthy());
        connector.call(|e| e.ping()).unwrap();
        assert_eq!(connector.current(), Slot::Backup);

        connector.primary.come_up();
        connector.backup.go_down();
        connector.call(|e| e.ping()).unwrap();
        assert_eq!(connector.current(), Slot::Primary);
    }

    #[test]
    fn test_connect_opens_both() {
        let mut opened = Vec::new();
        let connector = FailoverConnector::connect(pair(), |address| {
            opened.push(address.to_string());
            Ok(ScriptedEndpoint::healthy())
        })
        .unwrap();

        assert_eq!(opened, vec!["127.0.0.1:9999", "127.0.0.1:9998"]);
        assert_eq!(connector.endpoints().primary.as_str(), "127.0.0.1:9999");
    }
}
