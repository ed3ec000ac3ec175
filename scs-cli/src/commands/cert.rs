//! Cert command - issue and inspect local certificates

use anyhow::Result;
use clap::Subcommand;
use scs_core::domain::Role;
use scs_core::ports::{CertificateStore, StoreContainer};
use scs_core::CertificateWithKey;

use super::{certificate_store, load_config};
use crate::output;

#[derive(Subcommand)]
pub enum CertCommands {
    /// Issue a self-signed certificate with a fresh key pair
    Issue {
        /// Common name of the subject
        name: String,
        /// Organizational unit (Manager or SmartCardUser)
        #[arg(long)]
        ou: Option<Role>,
        /// Keep the certificate out of the trusted peers container
        #[arg(long)]
        untrusted: bool,
    },
    /// List installed certificates
    List {
        /// Show the trusted peers container instead of personal certificates
        #[arg(long)]
        trusted: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(command: CertCommands) -> Result<()> {
    let config = load_config()?;
    let store = certificate_store(&config)?;

    match command {
        CertCommands::Issue {
            name,
            ou,
            untrusted,
        } => {
            if store.lookup_certificate(&name)?.is_some() {
                anyhow::bail!("A personal certificate named '{}' already exists", name);
            }
            let issued = CertificateWithKey::generate(&name, ou);
            store.install(StoreContainer::Personal, &issued)?;
            if !untrusted {
                store.install(StoreContainer::TrustedPeople, &issued)?;
            }
            output::success(&format!("Issued {}", issued.certificate.subject));
            println!("  Public key: {}", issued.certificate.public_key);
        }
        CertCommands::List { trusted, json } => {
            let container = if trusted {
                StoreContainer::TrustedPeople
            } else {
                StoreContainer::Personal
            };
            let certificates = store.list(container)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&certificates)?);
                return Ok(());
            }
            if certificates.is_empty() {
                println!("No certificates in {}.", container);
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Subject", "Role", "Public key", "Issued"]);
            for cert in certificates {
                let key = cert.public_key.chars().take(16).collect::<String>();
                table.add_row(vec![
                    cert.subject.clone(),
                    cert.role().to_string(),
                    format!("{}…", key),
                    cert.issued_at.format("%Y-%m-%d").to_string(),
                ]);
            }
            println!("{}", table);
        }
    }

    Ok(())
}
