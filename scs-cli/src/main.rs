//! SCS CLI - smart card credential service, gateway and ATM client

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{atm, card, cert, logs, serve, sign, status};

/// SCS - smart card credentials with a replicated service pair
#[derive(Parser)]
#[command(name = "scs", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a credential service instance or the transaction gateway
    Serve {
        #[command(subcommand)]
        command: serve::ServeCommands,
    },

    /// Manage smart cards
    Card {
        #[command(subcommand)]
        command: card::CardCommands,
    },

    /// Interactive ATM session against the gateway
    Atm {
        /// Username to suggest when authenticating
        #[arg(long)]
        username: Option<String>,
        /// Name of the personal certificate to present
        #[arg(long)]
        cert: String,
    },

    /// Sign a message with a personal certificate
    Sign {
        message: String,
        /// Certificate to sign with
        #[arg(long)]
        sender: String,
        /// Deliver the signed message to the credential service
        #[arg(long)]
        send: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Issue and list certificates
    Cert {
        #[command(subcommand)]
        command: cert::CertCommands,
    },

    /// Show which components are reachable
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View audit logs
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { command } => serve::run(command),
        Commands::Card { command } => card::run(command),
        Commands::Atm { username, cert } => atm::run(username, cert),
        Commands::Sign {
            message,
            sender,
            send,
            json,
        } => sign::run(message, sender, send, json),
        Commands::Cert { command } => cert::run(command),
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}
