//! Blocking HTTP clients for the credential service and the gateway
//!
//! Transport trouble (refused connection, timeout, undecodable response)
//! becomes `Error::Communication`. Everything the server answered comes
//! back as the typed error it sent.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::result::{Error, OperationResult, Result};
use crate::domain::{Address, CredentialRecord, InstanceRole, SignedEnvelope, TransactionOutcome};
use crate::ports::CredentialEndpoint;

use super::wire::{
    AmountRequest, AuthenticateRequest, AuthenticateResponse, BalanceRequest, BalanceResponse,
    CertificateRequest, CreateCardRequest, ReplicateRequest, RotatePinRequest, ValidatePinRequest,
};

/// JSON-over-HTTP transport shared by both clients
#[derive(Debug, Clone)]
struct Transport {
    client: Client,
    address: Address,
    base_url: String,
}

impl Transport {
    fn new(address: &Address, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            address: address.clone(),
            base_url: address.base_url(),
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        self.decode(response)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        self.decode(response)
    }

    fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .delete(&url)
            .send()
            .map_err(|e| self.map_request_error(e))?;
        self.decode(response)
    }

    fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();
        let envelope: OperationResult<T> = response.json().map_err(|e| {
            Error::communication(format!(
                "undecodable response from {} (HTTP {}): {}",
                self.address, status, e
            ))
        })?;
        envelope.into_result()
    }

    fn map_request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::communication(format!("request to {} timed out", self.address))
        } else if e.is_connect() {
            Error::communication(format!("unable to connect to {}: {}", self.address, e))
        } else {
            Error::communication(format!("request to {} failed: {}", self.address, e))
        }
    }
}

/// Client for one credential service instance
#[derive(Debug, Clone)]
pub struct HttpCredentialClient {
    transport: Transport,
}

impl HttpCredentialClient {
    pub fn new(address: &Address, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(address, timeout)?,
        })
    }

    pub fn address(&self) -> &Address {
        &self.transport.address
    }

    /// Role the instance reports for itself
    pub fn instance_role(&self) -> Result<InstanceRole> {
        let role: String = self.transport.get("/ping")?;
        role.parse()
    }
}

fn certificate(caller_cert: Option<&[u8]>) -> Option<Vec<u8>> {
    caller_cert.map(|c| c.to_vec())
}

impl CredentialEndpoint for HttpCredentialClient {
    fn ping(&self) -> Result<()> {
        self.transport.get::<String>("/ping").map(|_| ())
    }

    fn test_communication(&self, caller_cert: Option<&[u8]>) -> Result<()> {
        let body = CertificateRequest {
            certificate: certificate(caller_cert),
        };
        self.transport
            .post::<_, bool>("/test-communication", &body)
            .map(|_| ())
    }

    fn create_credential(&self, username: &str, pin: u32, caller_cert: Option<&[u8]>) -> Result<()> {
        let body = CreateCardRequest {
            username: username.to_string(),
            pin,
            certificate: certificate(caller_cert),
        };
        self.transport.post::<_, bool>("/cards", &body).map(|_| ())
    }

    fn validate_pin(&self, username: &str, pin: u32) -> Result<bool> {
        let body = ValidatePinRequest {
            username: username.to_string(),
            pin,
        };
        self.transport.post("/cards/validate", &body)
    }

    fn rotate_pin(
        &self,
        username: &str,
        old_pin: u32,
        new_pin: u32,
        caller_cert: Option<&[u8]>,
    ) -> Result<()> {
        let body = RotatePinRequest {
            username: username.to_string(),
            old_pin,
            new_pin,
            certificate: certificate(caller_cert),
        };
        self.transport.post::<_, bool>("/cards/rotate", &body).map(|_| ())
    }

    fn list_active_accounts(&self, caller_cert: Option<&[u8]>) -> Result<Vec<String>> {
        let body = CertificateRequest {
            certificate: certificate(caller_cert),
        };
        self.transport.post("/accounts", &body)
    }

    fn replicate(&self, record: &CredentialRecord, origin: InstanceRole) -> Result<()> {
        let body = ReplicateRequest {
            record: record.clone(),
            origin,
        };
        self.transport.post::<_, bool>("/replicate", &body).map(|_| ())
    }

    fn signed_message(&self, envelope: &SignedEnvelope) -> Result<bool> {
        self.transport.post("/signed-message", envelope)
    }
}

/// Client for a remote transaction gateway
///
/// Holds at most one session at a time; authenticating again starts a
/// fresh session, mirroring a reconnect.
#[derive(Debug)]
pub struct HttpGatewayClient {
    transport: Transport,
    session: Option<Uuid>,
}

impl HttpGatewayClient {
    pub fn new(address: &Address, timeout: Duration) -> Result<Self> {
        Ok(Self {
            transport: Transport::new(address, timeout)?,
            session: None,
        })
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session
    }

    /// Number of live sessions on the gateway
    pub fn ping(&self) -> Result<usize> {
        self.transport.get("/ping")
    }

    pub fn authenticate(&mut self, username: &str, pin: u32, caller_cert: Option<&[u8]>) -> Result<bool> {
        self.close()?;
        let body = AuthenticateRequest {
            username: username.to_string(),
            pin,
            certificate: certificate(caller_cert),
        };
        let response: AuthenticateResponse = self.transport.post("/sessions", &body)?;
        self.session = Some(response.session_id);
        Ok(response.authenticated)
    }

    pub fn deposit(&self, username: &str, amount: Decimal) -> Result<TransactionOutcome> {
        let path = self.session_path("deposit")?;
        self.transport.post(
            &path,
            &AmountRequest {
                username: username.to_string(),
                amount,
            },
        )
    }

    pub fn withdraw(&self, username: &str, amount: Decimal) -> Result<TransactionOutcome> {
        let path = self.session_path("withdraw")?;
        self.transport.post(
            &path,
            &AmountRequest {
                username: username.to_string(),
                amount,
            },
        )
    }

    pub fn balance(&self, username: &str) -> Result<Option<Decimal>> {
        let path = self.session_path("balance")?;
        let response: BalanceResponse = self.transport.post(
            &path,
            &BalanceRequest {
                username: username.to_string(),
            },
        )?;
        Ok(response.balance)
    }

    pub fn active_accounts(&self, caller_cert: Option<&[u8]>) -> Result<Vec<String>> {
        let path = self.session_path("accounts")?;
        self.transport.post(
            &path,
            &CertificateRequest {
                certificate: certificate(caller_cert),
            },
        )
    }

    /// End the current session, if any
    pub fn close(&mut self) -> Result<()> {
        if let Some(id) = self.session.take() {
            self.transport.delete::<bool>(&format!("/sessions/{}", id))?;
        }
        Ok(())
    }

    fn session_path(&self, action: &str) -> Result<String> {
        let id = self.session.ok_or_else(|| {
            Error::AuthenticationFailed("no gateway session; authenticate first".to_string())
        })?;
        Ok(format!("/sessions/{}/{}", id, action))
    }
}

// Best effort: an unreachable gateway expires the session on its own
impl Drop for HttpGatewayClient {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::debug!(error = %e, "could not close gateway session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn unused_address() -> Address {
        // Bind then drop to find a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Address::new(addr.to_string()).unwrap()
    }

    #[test]
    fn test_refused_connection_is_communication_error() {
        let client = HttpCredentialClient::new(&unused_address(), Duration::from_millis(500)).unwrap();
        let err = client.validate_pin("alice", 1234).unwrap_err();
        assert!(err.is_communication(), "unexpected error: {:?}", err);
    }

    #[test]
    fn test_gateway_calls_need_a_session() {
        let client = HttpGatewayClient::new(&unused_address(), Duration::from_millis(500)).unwrap();
        assert!(matches!(
            client.deposit("alice", Decimal::ONE),
            Err(Error::AuthenticationFailed(_))
        ));
    }
}
