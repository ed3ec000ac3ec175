//! Signed message channel
//!
//! Detached ed25519 signatures over the UTF-8 bytes of a message, checked
//! against the claimed sender's certificate from the certificate store.

use std::sync::Arc;

use ed25519_dalek::{Signature, Signer, Verifier};

use crate::domain::result::{Error, Result};
use crate::domain::{Certificate, SignedEnvelope};
use crate::ports::{CertificateStore, StoreContainer};

pub struct SignedMessageChannel {
    store: Arc<dyn CertificateStore>,
}

impl SignedMessageChannel {
    pub fn new(store: Arc<dyn CertificateStore>) -> Self {
        Self { store }
    }

    /// True only when `signature` is a valid signature of `message` by `sender_name`
    ///
    /// Unknown senders, malformed keys and malformed signatures all yield false.
    pub fn verify(&self, message: &str, signature: &[u8], sender_name: &str) -> bool {
        match self.try_verify(message, signature, sender_name) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(sender = sender_name, error = %e, "signature rejected");
                false
            }
        }
    }

    pub fn verify_envelope(&self, envelope: &SignedEnvelope) -> bool {
        self.verify(&envelope.message, &envelope.signature, &envelope.sender_name)
    }

    /// Sign `message` with the private key of `sender_name`
    pub fn sign(&self, message: &str, sender_name: &str) -> Result<SignedEnvelope> {
        let issued = self.store.lookup_certificate(sender_name)?.ok_or_else(|| {
            Error::not_found(format!("no personal certificate with private key for '{}'", sender_name))
        })?;
        let signature = issued.signing_key()?.sign(message.as_bytes());
        Ok(SignedEnvelope::new(message, signature.to_bytes().to_vec(), sender_name))
    }

    fn try_verify(&self, message: &str, signature: &[u8], sender_name: &str) -> Result<()> {
        let certificate = self.sender_certificate(sender_name)?;
        let key = certificate.verifying_key()?;
        let signature = Signature::from_slice(signature)
            .map_err(|e| Error::validation(format!("malformed signature: {}", e)))?;
        key.verify(message.as_bytes(), &signature)
            .map_err(|e| Error::validation(format!("signature does not match: {}", e)))
    }

    // Peers are normally trusted; a machine may also verify its own messages.
    fn sender_certificate(&self, sender_name: &str) -> Result<Certificate> {
        for container in [StoreContainer::TrustedPeople, StoreContainer::Personal] {
            if let Some(cert) = self
                .store
                .lookup_certificate_by_subject_exact(container, sender_name)?
            {
                return Ok(cert);
            }
        }
        Err(Error::not_found(format!("no certificate known for sender '{}'", sender_name)))
    }
}
