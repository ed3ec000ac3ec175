//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod authorization;
mod credential;
mod failover;
mod gateway;
mod ledger;
mod replication;
mod signing;

pub use authorization::{AuthorizationGuard, Caller, CARD_HOLDER_ROLES};
pub use credential::CredentialService;
pub use failover::FailoverConnector;
pub use gateway::{GatewaySession, SessionState, SharedEndpoint, TransactionGateway};
pub use ledger::{Ledger, Withdrawal};
pub use replication::{ReplicationOutcome, ReplicationPusher};
pub use signing::SignedMessageChannel;
