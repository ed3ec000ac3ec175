//! Status command - probe the service pair and the gateway

use anyhow::Result;
use colored::Colorize;
use scs_core::adapters::http::{HttpCredentialClient, HttpGatewayClient};
use scs_core::domain::Address;
use serde_json::json;

use super::load_config;
use crate::output;

fn probe_credential(address: &Address, timeout: std::time::Duration) -> serde_json::Value {
    let probe = HttpCredentialClient::new(address, timeout).and_then(|c| c.instance_role());
    match probe {
        Ok(role) => json!({ "address": address.to_string(), "up": true, "role": role }),
        Err(e) => json!({ "address": address.to_string(), "up": false, "error": e.to_string() }),
    }
}

pub fn run(json: bool) -> Result<()> {
    let config = load_config()?;
    let endpoints = &config.credential_endpoints;

    let primary = probe_credential(&endpoints.primary, config.request_timeout);
    let backup = probe_credential(&endpoints.backup, config.request_timeout);
    let gateway = match HttpGatewayClient::new(&config.gateway_address, config.request_timeout)
        .and_then(|c| c.ping())
    {
        Ok(sessions) => json!({ "address": config.gateway_address.to_string(), "up": true, "sessions": sessions }),
        Err(e) => json!({ "address": config.gateway_address.to_string(), "up": false, "error": e.to_string() }),
    };

    if json {
        let report = json!({ "primary": primary, "backup": backup, "gateway": gateway });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "SCS Status".bold());
    println!();

    let mut table = output::create_table();
    table.set_header(vec!["Component", "Address", "State", "Detail"]);
    for (name, probe) in [("primary", &primary), ("backup", &backup), ("gateway", &gateway)] {
        let up = probe["up"].as_bool().unwrap_or(false);
        let state = if up { "up".green() } else { "down".red() };
        let detail = if let Some(role) = probe["role"].as_str() {
            format!("reports role {}", role)
        } else if let Some(sessions) = probe["sessions"].as_u64() {
            format!("{} open sessions", sessions)
        } else {
            probe["error"].as_str().unwrap_or_default().to_string()
        };
        table.add_row(vec![
            name.to_string(),
            probe["address"].as_str().unwrap_or_default().to_string(),
            state.to_string(),
            detail,
        ]);
    }
    println!("{}", table);

    if primary["up"] == false && backup["up"] == false {
        output::warning("No credential service is reachable; card operations will fail");
    }
    Ok(())
}
