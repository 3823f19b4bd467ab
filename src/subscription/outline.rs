//! Outline JSON output
//!
//! Shadowsocks servers only; every other protocol is filtered out.

use serde_json::{json, Value};

use crate::error::SubscriptionError;
use crate::subscription::share::{Credential, ProcessedHost};

pub fn render(hosts: &[ProcessedHost]) -> Result<String, SubscriptionError> {
    let servers: Vec<Value> = hosts
        .iter()
        .filter_map(|host| match &host.credential {
            Credential::Shadowsocks { password, method } => Some(json!({
                "remarks": host.remark,
                "server": host.address,
                "server_port": host.port,
                "password": password,
                "method": method
            })),
            _ => None,
        })
        .collect();

    Ok(serde_json::to_string_pretty(&json!({ "servers": servers }))?)
}
