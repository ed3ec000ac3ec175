//! Result and error types for the core library

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// The variants follow the failure taxonomy the services rely on:
/// only `Communication` is ever retried (once, by the failover connector),
/// everything else is handed straight back to the caller.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Communication failure: {0}")]
    Communication(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Endpoints unavailable: {0}")]
    EndpointsUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a communication error
    pub fn communication(msg: impl Into<String>) -> Self {
        Self::Communication(msg.into())
    }

    /// Create an access denied error
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Both failover attempts failed at the communication level
    pub fn endpoints_unavailable(primary: &str, backup: &str, last_error: &Error) -> Self {
        Self::EndpointsUnavailable(format!(
            "primary ({}) and backup ({}) credential endpoints are both unreachable; last failure: {}",
            primary,
            backup,
            last_error.detail()
        ))
    }

    /// True for transport-level failures that justify trying the other endpoint
    pub fn is_communication(&self) -> bool {
        matches!(self, Error::Communication(_))
    }

    /// True for failures caused by the caller's certificate or role
    pub fn is_authorization(&self) -> bool {
        matches!(self, Error::InvalidCertificate(_) | Error::AccessDenied(_))
    }

    /// Wire classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Communication(_) => ErrorKind::Communication,
            Error::Validation(_) => ErrorKind::Validation,
            Error::AuthenticationFailed(_) => ErrorKind::AuthenticationFailed,
            Error::InvalidCertificate(_) => ErrorKind::InvalidCertificate,
            Error::AccessDenied(_) => ErrorKind::AccessDenied,
            Error::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::EndpointsUnavailable(_) => ErrorKind::EndpointsUnavailable,
            Error::Storage(_) | Error::Io(_) | Error::Json(_) | Error::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// The reason without the category prefix
    pub fn detail(&self) -> String {
        match self {
            Error::Communication(m)
            | Error::Validation(m)
            | Error::AuthenticationFailed(m)
            | Error::InvalidCertificate(m)
            | Error::AccessDenied(m)
            | Error::AlreadyExists(m)
            | Error::NotFound(m)
            | Error::EndpointsUnavailable(m)
            | Error::Storage(m)
            | Error::Other(m) => m.clone(),
            Error::Io(e) => e.to_string(),
            Error::Json(e) => e.to_string(),
        }
    }

    /// Rebuild a typed error from its wire form
    pub fn from_kind(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match kind {
            ErrorKind::Communication => Error::Communication(detail),
            ErrorKind::Validation => Error::Validation(detail),
            ErrorKind::AuthenticationFailed => Error::AuthenticationFailed(detail),
            ErrorKind::InvalidCertificate => Error::InvalidCertificate(detail),
            ErrorKind::AccessDenied => Error::AccessDenied(detail),
            ErrorKind::AlreadyExists => Error::AlreadyExists(detail),
            ErrorKind::NotFound => Error::NotFound(detail),
            ErrorKind::EndpointsUnavailable => Error::EndpointsUnavailable(detail),
            ErrorKind::Internal => Error::Other(detail),
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Serializable error classification carried in [`OperationResult`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Communication,
    Validation,
    AuthenticationFailed,
    InvalidCertificate,
    AccessDenied,
    AlreadyExists,
    NotFound,
    EndpointsUnavailable,
    Internal,
}

/// Operation result envelope used on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub kind: Option<ErrorKind>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    /// Create a failed result
    pub fn fail(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            kind: Some(kind),
        }
    }

    /// Convert back into a typed result on the receiving side
    pub fn into_result(self) -> Result<T> {
        if self.success {
            return self
                .data
                .ok_or_else(|| Error::communication("response reported success without data"));
        }
        let kind = self.kind.unwrap_or(ErrorKind::Internal);
        let detail = self.error.unwrap_or_else(|| "unspecified failure".to_string());
        Err(Error::from_kind(kind, detail))
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::fail(e.kind(), e.detail()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_result_ok() {
        let result: OperationResult<i32> = OperationResult::ok(42);
        assert!(result.success);
        assert_eq!(result.data, Some(42));
        assert!(result.error.is_none());
    }

    #[test]
    fn test_operation_result_fail() {
        let result: OperationResult<i32> =
            OperationResult::fail(ErrorKind::Validation, "Something went wrong");
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error, Some("Something went wrong".to_string()));
    }

    #[test]
    fn test_typed_error_survives_wire() {
        let err: Result<Vec<String>> = Err(Error::access_denied("OU=SmartCardUser is not Manager"));
        let envelope: OperationResult<Vec<String>> = err.into();
        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: OperationResult<Vec<String>> = serde_json::from_str(&json).unwrap();

        match decoded.into_result() {
            Err(Error::AccessDenied(msg)) => assert!(msg.contains("SmartCardUser")),
            other => panic!("expected AccessDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_success_without_data_is_a_transport_fault() {
        let envelope: OperationResult<bool> = OperationResult {
            success: true,
            data: None,
            error: None,
            kind: None,
        };
        assert!(envelope.into_result().unwrap_err().is_communication());
    }

    #[test]
    fn test_endpoints_unavailable_names_both_addresses() {
        let last = Error::communication("connection refused");
        let err = Error::endpoints_unavailable("127.0.0.1:9999", "127.0.0.1:9998", &last);
        let text = err.to_string();
        assert!(text.contains("127.0.0.1:9999"));
        assert!(text.contains("127.0.0.1:9998"));
        assert!(text.contains("connection refused"));
        assert_eq!(err.kind(), ErrorKind::EndpointsUnavailable);
    }
}
