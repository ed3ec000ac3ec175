//! HTTP routes of a credential service instance

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::domain::SignedEnvelope;
use crate::services::CredentialService;

use super::server::{handle, run_blocking, Payload, Reply};
use super::wire::{CertificateRequest, CreateCardRequest, ReplicateRequest, RotatePinRequest, ValidatePinRequest};

type ServiceState = State<Arc<CredentialService>>;

pub fn credential_router(service: Arc<CredentialService>) -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/test-communication", post(test_communication))
        .route("/cards", post(create_card))
        .route("/cards/validate", post(validate_pin))
        .route("/cards/rotate", post(rotate_pin))
        .route("/accounts", post(list_accounts))
        .route("/replicate", post(replicate))
        .route("/signed-message", post(signed_message))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Answers with the instance role
async fn ping(State(service): ServiceState) -> Reply<String> {
    run_blocking(move || {
        service.ping()?;
        Ok(service.instance_role().to_string())
    })
    .await
}

async fn test_communication(State(service): ServiceState, payload: Payload<CertificateRequest>) -> Reply<bool> {
    handle(payload, move |req| {
        service.test_communication(req.certificate.as_deref())?;
        Ok(true)
    })
    .await
}

async fn create_card(State(service): ServiceState, payload: Payload<CreateCardRequest>) -> Reply<bool> {
    handle(payload, move |req| {
        service.create_credential(&req.username, req.pin, req.certificate.as_deref())?;
        Ok(true)
    })
    .await
}

async fn validate_pin(State(service): ServiceState, payload: Payload<ValidatePinRequest>) -> Reply<bool> {
    handle(payload, move |req| service.validate_pin(&req.username, req.pin)).await
}

async fn rotate_pin(State(service): ServiceState, payload: Payload<RotatePinRequest>) -> Reply<bool> {
    handle(payload, move |req| {
        service.rotate_pin(&req.username, req.old_pin, req.new_pin, req.certificate.as_deref())?;
        Ok(true)
    })
    .await
}

async fn list_accounts(State(service): ServiceState, payload: Payload<CertificateRequest>) -> Reply<Vec<String>> {
    handle(payload, move |req| service.list_active_accounts(req.certificate.as_deref())).await
}

async fn replicate(State(service): ServiceState, payload: Payload<ReplicateRequest>) -> Reply<bool> {
    handle(payload, move |req| {
        service.apply_replica(&req.record, req.origin)?;
        Ok(true)
    })
    .await
}

async fn signed_message(State(service): ServiceState, payload: Payload<SignedEnvelope>) -> Reply<bool> {
    handle(payload, move |envelope| Ok(service.receive_signed_message(&envelope))).await
}
