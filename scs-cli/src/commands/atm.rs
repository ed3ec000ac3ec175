//! ATM command - interactive client for the transaction gateway

use anyhow::{Context, Result};
use dialoguer::{Input, Select};
use rust_decimal::Decimal;
use scs_core::adapters::http::HttpGatewayClient;

use super::{load_config, presented_certificate, read_pin};
use crate::output;

const MENU: &[&str] = &[
    "Authenticate",
    "Deposit",
    "Withdraw",
    "Balance",
    "Active accounts (managers)",
    "Exit",
];

pub fn run(username: Option<String>, cert: String) -> Result<()> {
    let config = load_config()?;
    let presented = presented_certificate(&config, &cert)?;
    let mut client = HttpGatewayClient::new(&config.gateway_address, config.request_timeout)?;

    output::info(&format!("ATM connected to gateway at {}", config.gateway_address));
    let mut user: Option<String> = None;

    loop {
        let choice = Select::new()
            .with_prompt(match &user {
                Some(name) => format!("Signed in as {}", name),
                None => "Not signed in".to_string(),
            })
            .items(MENU)
            .default(0)
            .interact()?;

        let step = match choice {
            0 => authenticate(&mut client, &mut user, username.as_deref(), &presented),
            1 => with_user(&user, |name| {
                let amount = read_amount("Amount to deposit")?;
                output::outcome(&client.deposit(name, amount)?);
                Ok(())
            }),
            2 => with_user(&user, |name| {
                let amount = read_amount("Amount to withdraw")?;
                output::outcome(&client.withdraw(name, amount)?);
                Ok(())
            }),
            3 => with_user(&user, |name| {
                match client.balance(name)? {
                    Some(balance) => println!("Balance: {}", output::format_amount(balance)),
                    None => output::warning(&format!("No account for '{}' yet", name)),
                }
                Ok(())
            }),
            4 => list_accounts(&client, &presented),
            _ => break,
        };

        // A failed step is reported and the session goes on
        if let Err(e) = step {
            output::error(&format!("{:#}", e));
        }
    }

    client.close()?;
    Ok(())
}

fn authenticate(
    client: &mut HttpGatewayClient,
    user: &mut Option<String>,
    suggested: Option<&str>,
    presented: &[u8],
) -> Result<()> {
    let mut prompt = Input::<String>::new().with_prompt("Username");
    if let Some(name) = suggested.or(user.as_deref()) {
        prompt = prompt.default(name.to_string());
    }
    let name = prompt.interact_text()?;
    let pin = read_pin(None, "PIN")?;

    *user = None;
    if client.authenticate(&name, pin, Some(presented))? {
        output::success(&format!("Welcome, {}", name));
        *user = Some(name);
    } else {
        output::error("Invalid username or PIN");
    }
    Ok(())
}

fn list_accounts(client: &HttpGatewayClient, presented: &[u8]) -> Result<()> {
    let accounts = client.active_accounts(Some(presented))?;
    if accounts.is_empty() {
        println!("No cards issued.");
    }
    for name in accounts {
        println!("  {}", name);
    }
    Ok(())
}

fn with_user<F>(user: &Option<String>, action: F) -> Result<()>
where
    F: FnOnce(&str) -> Result<()>,
{
    match user {
        Some(name) => action(name),
        None => {
            output::warning("Authenticate first");
            Ok(())
        }
    }
}

fn read_amount(prompt: &str) -> Result<Decimal> {
    let raw = Input::<String>::new().with_prompt(prompt).interact_text()?;
    parse_amount(&raw)
}

fn parse_amount(raw: &str) -> Result<Decimal> {
    let amount: Decimal = raw
        .trim()
        .parse()
        .with_context(|| format!("'{}' is not an amount", raw.trim()))?;
    if amount <= Decimal::ZERO {
        anyhow::bail!("Amount must be positive");
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 12.50 ").unwrap(), Decimal::new(1250, 2));
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-3").is_err());
        assert!(parse_amount("lots").is_err());
    }
}
