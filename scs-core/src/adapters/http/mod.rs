//! HTTP/JSON transport
//!
//! axum routers expose the credential service and the gateway; blocking
//! reqwest clients talk to them. Certificates travel base64-encoded in
//! request bodies and every response is an `OperationResult` envelope.

mod client;
mod credential_routes;
mod gateway_routes;
mod server;
pub mod wire;

pub use client::{HttpCredentialClient, HttpGatewayClient};
pub use credential_routes::credential_router;
pub use gateway_routes::{gateway_router, GatewayState};
pub use server::{ctrl_c, serve, BackgroundServer};
