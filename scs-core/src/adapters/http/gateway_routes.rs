//! HTTP routes of the transaction gateway
//!
//! Every remote ATM client gets its own gateway session, addressed by a
//! session id handed out by `POST /sessions`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::extract::{Path, State};
use axum::routing::{delete, get, post};
use axum::Router;
use rust_decimal::Decimal;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::DEFAULT_SESSION_IDLE_TIMEOUT_SECS;
use crate::domain::result::{Error, Result};
use crate::domain::TransactionOutcome;
use crate::services::{GatewaySession, TransactionGateway};

use super::server::{handle, run_blocking, Payload, Reply};
use super::wire::{
    AmountRequest, AuthenticateRequest, AuthenticateResponse, BalanceRequest, BalanceResponse,
    CertificateRequest,
};

type SharedSession = Arc<Mutex<GatewaySession>>;

struct SessionEntry {
    session: SharedSession,
    last_used: Instant,
}

/// Gateway plus its table of live sessions
///
/// Sessions idle for longer than the idle timeout are dropped whenever a
/// new session is opened, so clients that vanish without closing do not
/// accumulate.
pub struct GatewayState {
    gateway: TransactionGateway,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    idle_timeout: Duration,
}

impl GatewayState {
    pub fn new(gateway: TransactionGateway) -> Self {
        Self::with_idle_timeout(
            gateway,
            Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        )
    }

    pub fn with_idle_timeout(gateway: TransactionGateway, idle_timeout: Duration) -> Self {
        Self {
            gateway,
            sessions: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    pub fn gateway(&self) -> &TransactionGateway {
        &self.gateway
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Drop sessions unused for longer than the idle timeout
    ///
    /// Returns how many were removed.
    pub fn prune_idle(&self) -> Result<usize> {
        let mut table = self.table()?;
        let before = table.len();
        let idle_timeout = self.idle_timeout;
        table.retain(|_, entry| entry.last_used.elapsed() <= idle_timeout);
        let removed = before - table.len();
        if removed > 0 {
            tracing::info!(removed, remaining = table.len(), "expired idle gateway sessions");
        }
        Ok(removed)
    }

    fn table(&self) -> Result<MutexGuard<'_, HashMap<Uuid, SessionEntry>>> {
        self.sessions
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    fn open(&self) -> Result<(Uuid, SharedSession)> {
        self.prune_idle()?;
        let id = Uuid::new_v4();
        let session = Arc::new(Mutex::new(self.gateway.open_session()));
        self.table()?.insert(
            id,
            SessionEntry {
                session: session.clone(),
                last_used: Instant::now(),
            },
        );
        Ok((id, session))
    }

    // The table lock is released before the session is used
    fn session(&self, id: &str) -> Result<SharedSession> {
        let id = Uuid::parse_str(id).map_err(|_| Error::not_found(format!("no session '{}'", id)))?;
        let mut table = self.table()?;
        let entry = table
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("no session '{}'", id)))?;
        entry.last_used = Instant::now();
        Ok(entry.session.clone())
    }

    fn close(&self, id: &str) -> Result<bool> {
        let Ok(id) = Uuid::parse_str(id) else {
            return Ok(false);
        };
        Ok(self.table()?.remove(&id).is_some())
    }

    fn with_session<T>(&self, id: &str, work: impl FnOnce(&mut GatewaySession) -> Result<T>) -> Result<T> {
        let session = self.session(id)?;
        let mut session = session
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))?;
        work(&mut session)
    }
}

type GatewayStateRef = State<Arc<GatewayState>>;

pub fn gateway_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/sessions", post(open_session))
        .route("/sessions/:id", delete(close_session))
        .route("/sessions/:id/authenticate", post(authenticate))
        .route("/sessions/:id/deposit", post(deposit))
        .route("/sessions/:id/withdraw", post(withdraw))
        .route("/sessions/:id/balance", post(balance))
        .route("/sessions/:id/accounts", post(accounts))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ping(State(state): GatewayStateRef) -> Reply<usize> {
    run_blocking(move || Ok(state.session_count())).await
}

/// Open a session and authenticate it in one round trip
///
/// A refused PIN still returns the session id; errors discard the session.
async fn open_session(
    State(state): GatewayStateRef,
    payload: Payload<AuthenticateRequest>,
) -> Reply<AuthenticateResponse> {
    handle(payload, move |req| {
        let (id, session) = state.open()?;
        let outcome = session
            .lock()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
            .and_then(|mut s| s.authenticate_user(&req.username, req.pin, req.certificate.as_deref()));
        match outcome {
            Ok(authenticated) => Ok(AuthenticateResponse {
                session_id: id,
                authenticated,
            }),
            Err(e) => {
                state.close(&id.to_string())?;
                Err(e)
            }
        }
    })
    .await
}

async fn close_session(State(state): GatewayStateRef, Path(id): Path<String>) -> Reply<bool> {
    run_blocking(move || state.close(&id)).await
}

async fn authenticate(
    State(state): GatewayStateRef,
    Path(id): Path<String>,
    payload: Payload<AuthenticateRequest>,
) -> Reply<bool> {
    handle(payload, move |req| {
        state.with_session(&id, |s| s.authenticate_user(&req.username, req.pin, req.certificate.as_deref()))
    })
    .await
}

async fn deposit(
    State(state): GatewayStateRef,
    Path(id): Path<String>,
    payload: Payload<AmountRequest>,
) -> Reply<TransactionOutcome> {
    handle(payload, move |req| state.with_session(&id, |s| s.deposit(&req.username, req.amount))).await
}

async fn withdraw(
    State(state): GatewayStateRef,
    Path(id): Path<String>,
    payload: Payload<AmountRequest>,
) -> Reply<TransactionOutcome> {
    handle(payload, move |req| state.with_session(&id, |s| s.withdraw(&req.username, req.amount))).await
}

async fn balance(
    State(state): GatewayStateRef,
    Path(id): Path<String>,
    payload: Payload<BalanceRequest>,
) -> Reply<BalanceResponse> {
    handle(payload, move |req| {
        let balance: Option<Decimal> = state.with_session(&id, |s| s.get_balance(&req.username))?;
        Ok(BalanceResponse {
            username: req.username,
            balance,
        })
    })
    .await
}

async fn accounts(
    State(state): GatewayStateRef,
    Path(id): Path<String>,
    payload: Payload<CertificateRequest>,
) -> Reply<Vec<String>> {
    handle(payload, move |req| {
        state.with_session(&id, |s| s.get_active_user_accounts(req.certificate.as_deref()))
    })
    .await
}
