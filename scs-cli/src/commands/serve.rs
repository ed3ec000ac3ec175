//! Serve command - run a credential service instance or the gateway

use anyhow::{Context, Result};
use axum::Router;
use clap::Subcommand;
use scs_core::adapters::http::{ctrl_c, serve};
use scs_core::domain::InstanceRole;
use scs_core::{CredentialContext, GatewayContext};

use super::{get_scs_dir, init_tracing};
use crate::output;

#[derive(Subcommand)]
pub enum ServeCommands {
    /// Run a credential service instance
    Credentials {
        /// Instance role (primary or backup); defaults to the configured role
        #[arg(long)]
        role: Option<InstanceRole>,
    },
    /// Run the ATM transaction gateway
    Gateway,
}

pub fn run(command: ServeCommands) -> Result<()> {
    init_tracing();
    let scs_dir = get_scs_dir()?;

    match command {
        ServeCommands::Credentials { role } => {
            let ctx = CredentialContext::new(&scs_dir, role)?;
            let address = ctx.listen_address().to_string();
            output::info(&format!(
                "Credential service ({}) on {}; records in {}",
                ctx.role,
                address,
                ctx.config.cards_dir(ctx.role).display()
            ));
            if ctx.role == InstanceRole::Primary {
                output::info(&format!(
                    "Replicating to backup at {}",
                    ctx.config.peer_address(ctx.role)
                ));
            }
            block_on_server(&address, ctx.router())?;
            // Service clients hold blocking HTTP handles; release them off the runtime
            drop(ctx);
        }
        ServeCommands::Gateway => {
            let ctx = GatewayContext::new(&scs_dir)?;
            let address = ctx.listen_address().to_string();
            output::info(&format!(
                "Transaction gateway on {}; credential service at {} (backup {})",
                address, ctx.config.credential_endpoints.primary, ctx.config.credential_endpoints.backup
            ));
            block_on_server(&address, ctx.router())?;
            drop(ctx);
        }
    }

    output::success("Stopped.");
    Ok(())
}

fn block_on_server(address: &str, router: Router) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async {
        let listener = tokio::net::TcpListener::bind(address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;
        serve(listener, router, ctrl_c()).await?;
        Ok::<_, anyhow::Error>(())
    })?;
    drop(runtime);
    Ok(())
}
