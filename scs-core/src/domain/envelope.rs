//! Signed message envelope

use serde::{Deserialize, Serialize};

use super::encoding::base64_bytes;

/// A message with a detached signature and the name of its claimed sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedEnvelope {
    pub message: String,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    /// Used to look up the sender's certificate on the receiving side
    pub sender_name: String,
}

impl SignedEnvelope {
    pub fn new(message: impl Into<String>, signature: Vec<u8>, sender_name: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            signature,
            sender_name: sender_name.into(),
        }
    }
}
