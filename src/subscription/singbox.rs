//! Sing-Box JSON output

use serde_json::{json, Map, Value};

use crate::error::SubscriptionError;
use crate::subscription::share::{Credential, ProcessedHost};

pub fn render(hosts: &[ProcessedHost]) -> Result<String, SubscriptionError> {
    let mut proxy_outbounds = Vec::new();
    let mut proxy_names = Vec::new();

    for host in hosts {
        let Some(outbound) = outbound(host) else {
            continue;
        };
        proxy_names.push(host.remark.clone());
        proxy_outbounds.push(outbound);
    }

    let mut outbounds = vec![json!({
        "type": "selector",
        "tag": "proxy",
        "outbounds": proxy_names
    })];
    outbounds.extend(proxy_outbounds);
    outbounds.push(json!({"type": "direct", "tag": "direct"}));

    let config = json!({
        "log": {"level": "warn"},
        "outbounds": outbounds,
        "route": {"rules": [], "auto_detect_interface": true}
    });
    Ok(serde_json::to_string_pretty(&config)?)
}

fn outbound(host: &ProcessedHost) -> Option<Value> {
    let mut outbound = match &host.credential {
        Credential::Vmess { id } => json!({
            "type": "vmess",
            "tag": host.remark,
            "server": host.address,
            "server_port": host.port,
            "uuid": id.to_string(),
            "alter_id": 0,
            "security": "auto"
        }),
        Credential::Vless { id, flow } => {
            let mut o = json!({
                "type": "vless",
                "tag": host.remark,
                "server": host.address,
                "server_port": host.port,
                "uuid": id.to_string()
            });
            if !flow.is_empty() {
                o["flow"] = json!(flow);
            }
            o
        }
        Credential::Trojan { password } => json!({
            "type": "trojan",
            "tag": host.remark,
            "server": host.address,
            "server_port": host.port,
            "password": password
        }),
        Credential::Shadowsocks { password, method } => json!({
            "type": "shadowsocks",
            "tag": host.remark,
            "server": host.address,
            "server_port": host.port,
            "method": method,
            "password": password
        }),
    };

    if host.tls == "tls" || host.tls == "reality" {
        let mut tls = Map::new();
        tls.insert("enabled".to_string(), json!(true));
        if !host.sni.is_empty() {
            tls.insert("server_name".to_string(), json!(host.sni));
        }
        if host.allowinsecure {
            tls.insert("insecure".to_string(), json!(true));
        }
        if let Some(alpn) = &host.alpn {
            let entries: Vec<&str> = alpn.split(',').filter(|s| !s.is_empty()).collect();
            if !entries.is_empty() {
                tls.insert("alpn".to_string(), json!(entries));
            }
        }
        if let Some(fp) = &host.fp {
            tls.insert(
                "utls".to_string(),
                json!({"enabled": true, "fingerprint": fp}),
            );
        }
        if host.tls == "reality" {
            let mut reality = Map::new();
            reality.insert("enabled".to_string(), json!(true));
            if let Some(pbk) = &host.pbk {
                reality.insert("public_key".to_string(), json!(pbk));
            }
            if !host.sid.is_empty() {
                reality.insert("short_id".to_string(), json!(host.sid));
            }
            tls.insert("reality".to_string(), Value::Object(reality));
        }
        outbound["tls"] = Value::Object(tls);
    }

    if let Some(transport) = transport(host) {
        outbound["transport"] = transport;
    } else if matches!(host.network.as_str(), "kcp" | "quic" | "splithttp" | "xhttp") {
        // Sing-Box has no counterpart for these transports
        return None;
    }

    Some(outbound)
}

/// Sing-Box transport keys differ from Xray's; map what exists, decline the
/// rest.
fn transport(host: &ProcessedHost) -> Option<Value> {
    match host.network.as_str() {
        "ws" => {
            let mut t = json!({"type": "ws"});
            if !host.path.is_empty() {
                t["path"] = json!(host.path);
            }
            if !host.host.is_empty() {
                t["headers"] = json!({"Host": host.host});
            }
            Some(t)
        }
        "grpc" | "gun" => {
            let mut t = json!({"type": "grpc"});
            if !host.path.is_empty() {
                t["service_name"] = json!(host.path);
            }
            Some(t)
        }
        "http" | "h2" | "h3" => {
            let mut t = json!({"type": "http"});
            if !host.path.is_empty() {
                t["path"] = json!(host.path);
            }
            if !host.host.is_empty() {
                t["host"] = json!([host.host]);
            }
            Some(t)
        }
        "httpupgrade" => {
            let mut t = json!({"type": "httpupgrade"});
            if !host.path.is_empty() {
                t["path"] = json!(host.path);
            }
            if !host.host.is_empty() {
                t["host"] = json!(host.host);
            }
            Some(t)
        }
        _ => None,
    }
}
