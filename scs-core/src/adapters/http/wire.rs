//! Request bodies shared by the HTTP servers and clients
//!
//! Responses are always an `OperationResult<T>` envelope.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::encoding::base64_opt;
use crate::domain::{CredentialRecord, InstanceRole};

/// Body carrying only the caller's certificate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRequest {
    #[serde(with = "base64_opt", default)]
    pub certificate: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardRequest {
    pub username: String,
    pub pin: u32,
    #[serde(with = "base64_opt", default)]
    pub certificate: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatePinRequest {
    pub username: String,
    pub pin: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotatePinRequest {
    pub username: String,
    pub old_pin: u32,
    pub new_pin: u32,
    #[serde(with = "base64_opt", default)]
    pub certificate: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicateRequest {
    pub record: CredentialRecord,
    pub origin: InstanceRole,
}

/// Opens a gateway session and authenticates it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateRequest {
    pub username: String,
    pub pin: u32,
    #[serde(with = "base64_opt", default)]
    pub certificate: Option<Vec<u8>>,
}

/// Session id is returned even when authentication is refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticateResponse {
    pub session_id: Uuid,
    pub authenticated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountRequest {
    pub username: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRequest {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub username: String,
    /// `None` until the first deposit
    pub balance: Option<Decimal>,
}
