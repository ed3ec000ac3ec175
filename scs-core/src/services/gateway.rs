//! Transaction gateway - the ATM
//!
//! The gateway owns the shared ledger and hands out sessions. A session
//! starts unauthenticated, becomes authenticated when the credential
//! service accepts a PIN, and from then on may move money for that one
//! user. Each session owns its own failover connector.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::result::{Error, Result};
use crate::domain::{EndpointPair, Role, Slot, TransactionOutcome};
use crate::ports::{AuditSink, CredentialEndpoint};

use super::authorization::{AuthorizationGuard, CARD_HOLDER_ROLES};
use super::failover::FailoverConnector;
use super::ledger::{Ledger, Withdrawal};

/// Handle to one credential service instance
pub type SharedEndpoint = Arc<dyn CredentialEndpoint>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { username: String, role: Role },
}

pub struct TransactionGateway {
    ledger: Arc<Ledger>,
    endpoints: EndpointPair,
    primary: SharedEndpoint,
    backup: SharedEndpoint,
    audit: Arc<dyn AuditSink>,
}

impl TransactionGateway {
    pub fn new(
        ledger: Arc<Ledger>,
        endpoints: EndpointPair,
        primary: SharedEndpoint,
        backup: SharedEndpoint,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            ledger,
            endpoints,
            primary,
            backup,
            audit,
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Fresh unauthenticated session
    pub fn open_session(&self) -> GatewaySession {
        GatewaySession {
            connector: FailoverConnector::new(
                self.endpoints.clone(),
                self.primary.clone(),
                self.backup.clone(),
            ),
            ledger: self.ledger.clone(),
            guard: AuthorizationGuard::new(),
            audit: self.audit.clone(),
            state: SessionState::Unauthenticated,
        }
    }
}

pub struct GatewaySession {
    connector: FailoverConnector<SharedEndpoint>,
    ledger: Arc<Ledger>,
    guard: AuthorizationGuard,
    audit: Arc<dyn AuditSink>,
    state: SessionState,
}

impl GatewaySession {
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// Username this session authenticated as
    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { username, .. } => Some(username),
            SessionState::Unauthenticated => None,
        }
    }

    /// Credential endpoint the next call will go to
    pub fn current_endpoint(&self) -> Slot {
        self.connector.current()
    }

    /// Check a PIN against the credential service
    ///
    /// `Ok(false)` leaves the session unauthenticated. When neither
    /// credential endpoint answers the error is returned, never a false.
    pub fn authenticate_user(
        &mut self,
        username: &str,
        pin: u32,
        caller_cert: Option<&[u8]>,
    ) -> Result<bool> {
        let role = self
            .guard
            .authorize_any(caller_cert, CARD_HOLDER_ROLES)
            .map_err(|e| {
                self.audit.log_event(&format!(
                    "ACCESS DENIED: authentication attempt for '{}': {}",
                    username,
                    e.detail()
                ));
                e
            })?;

        let outcome = self.connector.call(|endpoint| endpoint.validate_pin(username, pin));
        match outcome {
            Ok(true) => {
                tracing::info!(
                    user = username,
                    endpoint = %self.connector.current(),
                    "user authenticated"
                );
                self.audit
                    .log_event(&format!("User '{}' authenticated successfully.", username));
                self.state = SessionState::Authenticated {
                    username: username.to_string(),
                    role,
                };
                Ok(true)
            }
            Ok(false) => {
                self.audit
                    .log_event(&format!("ERROR: Authentication failed for user '{}'.", username));
                self.state = SessionState::Unauthenticated;
                Ok(false)
            }
            Err(e) => {
                self.audit.log_event(&format!(
                    "ERROR: Authentication for user '{}' could not be completed: {}",
                    username, e
                ));
                self.state = SessionState::Unauthenticated;
                Err(e)
            }
        }
    }

    pub fn deposit(&self, username: &str, amount: Decimal) -> Result<TransactionOutcome> {
        if let Some(refusal) = self.refuse_ledger_access(username, "deposit") {
            return Ok(refusal);
        }
        let balance = self.ledger.deposit(username, amount)?;
        let message = format!(
            "User '{}' deposited {}. New balance: {}.",
            username, amount, balance
        );
        self.audit.log_event(&message);
        Ok(TransactionOutcome::success(message, balance))
    }

    pub fn withdraw(&self, username: &str, amount: Decimal) -> Result<TransactionOutcome> {
        if let Some(refusal) = self.refuse_ledger_access(username, "withdraw") {
            return Ok(refusal);
        }
        let outcome = match self.ledger.withdraw(username, amount)? {
            Withdrawal::Completed { balance } => {
                let message = format!(
                    "User '{}' withdrew {}. New balance: {}.",
                    username, amount, balance
                );
                self.audit.log_event(&message);
                TransactionOutcome::success(message, balance)
            }
            Withdrawal::InsufficientFunds { balance } => {
                let message = format!(
                    "Insufficient funds: user '{}' tried to withdraw {} but the balance is {}.",
                    username, amount, balance
                );
                self.audit.log_event(&format!("ERROR: {}", message));
                TransactionOutcome::failure(message, Some(balance))
            }
            Withdrawal::NoAccount => {
                let message = format!(
                    "Insufficient funds: user '{}' has no account to withdraw {} from.",
                    username, amount
                );
                self.audit.log_event(&format!("ERROR: {}", message));
                TransactionOutcome::failure(message, None)
            }
        };
        Ok(outcome)
    }

    /// Balance of the authenticated user; `None` before the first deposit
    pub fn get_balance(&self, username: &str) -> Result<Option<Decimal>> {
        if let Some(refusal) = self.refuse_ledger_access(username, "read the balance") {
            return Err(Error::AuthenticationFailed(refusal.message));
        }
        self.ledger.balance(username)
    }

    /// Every username known to the credential service; managers only
    pub fn get_active_user_accounts(&mut self, caller_cert: Option<&[u8]>) -> Result<Vec<String>> {
        if !self.is_authenticated() {
            return Err(Error::AuthenticationFailed(
                "authenticate before listing accounts".to_string(),
            ));
        }
        self.guard.authorize_manager(caller_cert).map_err(|e| {
            self.audit.log_event(&format!(
                "ACCESS DENIED: Unauthorized attempt to access all accounts: {}",
                e.detail()
            ));
            e
        })?;

        self.connector
            .call(|endpoint| endpoint.list_active_accounts(caller_cert))
    }

    // Business refusal for ledger calls outside an authenticated session
    fn refuse_ledger_access(&self, username: &str, action: &str) -> Option<TransactionOutcome> {
        let message = match &self.state {
            SessionState::Unauthenticated => {
                format!("Cannot {} for '{}': session is not authenticated.", action, username)
            }
            SessionState::Authenticated { username: owner, .. } if owner != username => format!(
                "Cannot {} for '{}': session is authenticated as '{}'.",
                action, username, owner
            ),
            SessionState::Authenticated { .. } => return None,
        };
        self.audit.log_event(&format!("ERROR: {}", message));
        Some(TransactionOutcome::failure(message, None))
    }
}
