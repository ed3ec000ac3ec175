//! Shared server plumbing: response envelopes, blocking hand-off, listeners

use std::future::Future;
use std::net::TcpListener as StdTcpListener;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result as AnyResult};
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Json, Router};
use tokio::sync::oneshot;

use crate::domain::result::{Error, ErrorKind, OperationResult, Result};
use crate::domain::Address;

/// Handler response: status code plus the `OperationResult` envelope
pub type Reply<T> = (StatusCode, Json<OperationResult<T>>);

/// JSON body, with malformed bodies kept as a value instead of a rejection
pub type Payload<T> = std::result::Result<Json<T>, JsonRejection>;

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::AuthenticationFailed | ErrorKind::InvalidCertificate => StatusCode::UNAUTHORIZED,
        ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::Communication => StatusCode::BAD_GATEWAY,
        ErrorKind::EndpointsUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn reply<T>(result: Result<T>) -> Reply<T> {
    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => status_for(e.kind()),
    };
    (status, Json(result.into()))
}

/// Run service code on the blocking pool
///
/// Services do file I/O and blocking HTTP to their peers, neither of which
/// may run on a runtime worker.
pub async fn run_blocking<T, F>(work: F) -> Reply<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => reply(result),
        Err(e) => reply(Err(Error::Other(format!("request worker failed: {}", e)))),
    }
}

/// Decode the body, then hand it to `work` on the blocking pool
pub async fn handle<B, T, F>(payload: Payload<B>, work: F) -> Reply<T>
where
    B: Send + 'static,
    T: Send + 'static,
    F: FnOnce(B) -> Result<T> + Send + 'static,
{
    match payload {
        Ok(Json(body)) => run_blocking(move || work(body)).await,
        Err(rejection) => reply(Err(Error::validation(format!(
            "malformed request: {}",
            rejection.body_text()
        )))),
    }
}

/// Serve `router` on `listener` until `shutdown` resolves
pub async fn serve<S>(listener: tokio::net::TcpListener, router: Router, shutdown: S) -> std::io::Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

/// Resolves on Ctrl-C
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

/// A server running on its own thread and runtime
///
/// Stops when dropped. Used by tests and anywhere a synchronous caller
/// needs a live endpoint.
pub struct BackgroundServer {
    address: Address,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl BackgroundServer {
    /// Serve on an ephemeral localhost port
    pub fn start(router: Router) -> AnyResult<Self> {
        Self::start_on("127.0.0.1:0", router)
    }

    pub fn start_on(bind: &str, router: Router) -> AnyResult<Self> {
        let listener = StdTcpListener::bind(bind).with_context(|| format!("Failed to bind {}", bind))?;
        listener.set_nonblocking(true)?;
        let local = listener.local_addr()?;
        let address = Address::new(local.to_string())?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .context("Failed to build server runtime")?;

        let (tx, rx) = oneshot::channel::<()>();
        let handle = thread::spawn(move || {
            runtime.block_on(async move {
                let listener = match tokio::net::TcpListener::from_std(listener) {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to adopt listener");
                        return;
                    }
                };
                let shutdown = async {
                    let _ = rx.await;
                };
                if let Err(e) = serve(listener, router, shutdown).await {
                    tracing::error!(error = %e, "server stopped with an error");
                }
            });
        });

        Ok(Self {
            address,
            shutdown: Some(tx),
            handle: Some(handle),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Stop serving and wait for the server thread
    pub fn stop(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for BackgroundServer {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_map_to_statuses() {
        let (status, Json(body)) = reply::<bool>(Err(Error::access_denied("no")));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.kind, Some(ErrorKind::AccessDenied));

        let (status, _) = reply::<bool>(Err(Error::endpoints_unavailable(
            "a:1",
            "b:2",
            &Error::communication("refused"),
        )));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, Json(body)) = reply(Ok(true));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data, Some(true));
    }
}
