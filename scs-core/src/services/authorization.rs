//! Authorization guard - certificate-derived role checks
//!
//! Every privileged call carries the caller's certificate and is checked on
//! its own; nothing is remembered between calls.

use crate::domain::result::{Error, Result};
use crate::domain::{Certificate, Role};

/// Roles allowed to manage smart cards
pub const CARD_HOLDER_ROLES: &[Role] = &[Role::SmartCardUser, Role::Manager];

/// Caller identity established for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub subject: String,
    pub role: Role,
}

/// Stateless role gate over presented certificates
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    pub fn new() -> Self {
        Self
    }

    /// Require exactly `required`
    pub fn authorize(&self, presented: Option<&[u8]>, required: Role) -> Result<Role> {
        self.authorize_caller(presented, &[required]).map(|c| c.role)
    }

    /// Require any of `allowed`
    pub fn authorize_any(&self, presented: Option<&[u8]>, allowed: &[Role]) -> Result<Role> {
        self.authorize_caller(presented, allowed).map(|c| c.role)
    }

    /// Require the Manager role
    ///
    /// A caller with no certificate is simply not a manager, so this is
    /// `AccessDenied` rather than `InvalidCertificate`.
    pub fn authorize_manager(&self, presented: Option<&[u8]>) -> Result<Caller> {
        match presented {
            Some(bytes) => self.authorize_caller(Some(bytes), &[Role::Manager]),
            None => Err(Error::access_denied(format!(
                "no client certificate was presented; this operation requires {}",
                describe(&[Role::Manager])
            ))),
        }
    }

    /// Parse the certificate and match its OU against `allowed`
    pub fn authorize_caller(&self, presented: Option<&[u8]>, allowed: &[Role]) -> Result<Caller> {
        let bytes = presented.ok_or_else(|| {
            Error::InvalidCertificate("no client certificate was presented".to_string())
        })?;
        let certificate = Certificate::from_bytes(bytes)?;

        let required = describe(allowed);
        let ou = certificate.organizational_unit().ok_or_else(|| {
            Error::access_denied(format!(
                "certificate '{}' has no OU attribute; this operation requires {}",
                certificate.subject, required
            ))
        })?;

        // Unauthorized is never grantable even if a certificate claims it
        let role = allowed
            .iter()
            .copied()
            .filter(|r| *r != Role::Unauthorized)
            .find(|r| ou.eq_ignore_ascii_case(r.as_str()))
            .ok_or_else(|| {
                Error::access_denied(format!(
                    "user '{}' with OU={} tried to call an operation that requires {}",
                    certificate.common_name().unwrap_or(&certificate.subject),
                    ou,
                    required
                ))
            })?;

        Ok(Caller {
            subject: certificate.subject,
            role,
        })
    }
}

fn describe(allowed: &[Role]) -> String {
    match allowed {
        [] => "no role".to_string(),
        [one] => format!("role {}", one),
        many => {
            let names: Vec<_> = many.iter().map(|r| r.as_str()).collect();
            format!("one of the roles {}", names.join(" or "))
        }
    }
}
