//! Card command - manage smart card credentials through the service pair

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use scs_core::adapters::http::HttpCredentialClient;
use scs_core::config::Config;
use scs_core::credential_connector;
use scs_core::domain::Slot;
use scs_core::ports::CredentialEndpoint;
use scs_core::services::FailoverConnector;

use super::{load_config, presented_certificate, read_pin};
use crate::output;

#[derive(Subcommand)]
pub enum CardCommands {
    /// Issue a new card for a user
    Create {
        username: String,
        /// Initial PIN (prompted when omitted)
        #[arg(long)]
        pin: Option<u32>,
        /// Name of the personal certificate to present
        #[arg(long)]
        cert: String,
    },
    /// Change a card's PIN
    Rotate {
        username: String,
        #[arg(long)]
        cert: String,
    },
    /// Check a PIN without opening a session
    Validate {
        username: String,
        #[arg(long)]
        pin: Option<u32>,
    },
    /// List all card holders (managers only)
    List {
        #[arg(long)]
        cert: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Verify the caller can reach and use the service
    Test {
        #[arg(long)]
        cert: String,
    },
}

pub fn run(command: CardCommands) -> Result<()> {
    let config = load_config()?;
    let mut connector = credential_connector(&config)?;

    match command {
        CardCommands::Create {
            username,
            pin,
            cert,
        } => {
            let presented = presented_certificate(&config, &cert)?;
            let pin = read_pin(pin, "PIN for the new card")?;
            connector.call(|c| c.create_credential(&username, pin, Some(&presented)))?;
            output::success(&format!("Created card for '{}'", username));
        }
        CardCommands::Rotate { username, cert } => {
            let presented = presented_certificate(&config, &cert)?;
            let old_pin = read_pin(None, "Current PIN")?;
            let new_pin = read_pin(None, "New PIN")?;
            let confirm = read_pin(None, "Repeat new PIN")?;
            if new_pin != confirm {
                anyhow::bail!("PINs do not match");
            }
            connector.call(|c| c.rotate_pin(&username, old_pin, new_pin, Some(&presented)))?;
            output::success(&format!("PIN changed for '{}'", username));
        }
        CardCommands::Validate { username, pin } => {
            let pin = read_pin(pin, "PIN")?;
            if connector.call(|c| c.validate_pin(&username, pin))? {
                output::success("PIN accepted");
            } else {
                output::error("Invalid username or PIN");
            }
        }
        CardCommands::List { cert, json } => {
            let presented = presented_certificate(&config, &cert)?;
            let accounts = connector.call(|c| c.list_active_accounts(Some(&presented)))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&accounts)?);
            } else if accounts.is_empty() {
                println!("No cards issued.");
            } else {
                let mut table = output::create_table();
                table.set_header(vec!["#", "Card holder"]);
                for (i, name) in accounts.iter().enumerate() {
                    table.add_row(vec![(i + 1).to_string(), name.clone()]);
                }
                println!("{}", table);
            }
        }
        CardCommands::Test { cert } => {
            let presented = presented_certificate(&config, &cert)?;
            connector.call(|c| c.test_communication(Some(&presented)))?;
            let role = connector.call(|c| c.instance_role())?;
            output::success(&format!(
                "Connected to {} instance at {}",
                role.to_string().bold(),
                connector.current_address()
            ));
        }
    }

    report_failover(&config, &connector);
    Ok(())
}

fn report_failover(config: &Config, connector: &FailoverConnector<HttpCredentialClient>) {
    if connector.current() == Slot::Backup {
        output::warning(&format!(
            "Primary at {} was unreachable; served by backup at {}",
            config.credential_endpoints.primary, config.credential_endpoints.backup
        ));
    }
}
