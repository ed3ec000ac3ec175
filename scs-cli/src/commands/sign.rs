//! Sign command - sign a message and optionally deliver it

use std::sync::Arc;

use anyhow::Result;
use scs_core::credential_connector;
use scs_core::ports::CredentialEndpoint;
use scs_core::services::SignedMessageChannel;

use super::{certificate_store, load_config};
use crate::output;

pub fn run(message: String, sender: String, send: bool, json: bool) -> Result<()> {
    let config = load_config()?;
    let channel = SignedMessageChannel::new(Arc::new(certificate_store(&config)?));
    let envelope = channel.sign(&message, &sender)?;

    if !send {
        if json {
            println!("{}", serde_json::to_string_pretty(&envelope)?);
        } else {
            output::success(&format!("Signed as '{}'", envelope.sender_name));
            println!("  Signature: {}", hex::encode(&envelope.signature));
        }
        return Ok(());
    }

    let mut connector = credential_connector(&config)?;
    let verified = connector.call(|c| c.signed_message(&envelope))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "sender": envelope.sender_name,
                "deliveredTo": connector.current_address().to_string(),
                "verified": verified
            })
        );
    } else if verified {
        output::success(&format!(
            "Message from '{}' verified by {}",
            sender,
            connector.current_address()
        ));
    } else {
        output::error(&format!(
            "{} rejected the signature from '{}'",
            connector.current_address(),
            sender
        ));
    }
    Ok(())
}
