//! Clash and Clash-Meta YAML output
//!
//! Classic Clash gets Shadowsocks/VMess/Trojan only; Clash-Meta additionally
//! understands VLESS, Reality and client fingerprints.

use serde_json::{json, Map, Value};

use crate::error::SubscriptionError;
use crate::subscription::share::{Credential, ProcessedHost};

pub fn render(hosts: &[ProcessedHost], meta: bool) -> Result<String, SubscriptionError> {
    let mut proxies = Vec::new();
    let mut names = Vec::new();

    for host in hosts {
        let Some(proxy) = proxy(host, meta) else {
            continue;
        };
        names.push(host.remark.clone());
        proxies.push(proxy);
    }

    let config = json!({
        "proxies": proxies,
        "proxy-groups": [{
            "name": "PROXY",
            "type": "select",
            "proxies": names
        }],
        "rules": []
    });
    Ok(serde_yaml::to_string(&config)?)
}

fn proxy(host: &ProcessedHost, meta: bool) -> Option<Value> {
    if !meta && host.tls == "reality" {
        return None;
    }

    let mut proxy = match &host.credential {
        Credential::Shadowsocks { password, method } => {
            if !meta && method.starts_with("2022-blake3-") {
                return None;
            }
            json!({
                "name": host.remark,
                "type": "ss",
                "server": host.address,
                "port": host.port,
                "cipher": method,
                "password": password,
                "udp": true
            })
        }
        Credential::Vmess { id } => json!({
            "name": host.remark,
            "type": "vmess",
            "server": host.address,
            "port": host.port,
            "uuid": id.to_string(),
            "alterId": 0,
            "cipher": "auto"
        }),
        Credential::Trojan { password } => json!({
            "name": host.remark,
            "type": "trojan",
            "server": host.address,
            "port": host.port,
            "password": password
        }),
        Credential::Vless { id, flow } => {
            if !meta {
                return None;
            }
            let mut o = json!({
                "name": host.remark,
                "type": "vless",
                "server": host.address,
                "port": host.port,
                "uuid": id.to_string()
            });
            if !flow.is_empty() {
                o["flow"] = json!(flow);
            }
            o
        }
    };

    apply_tls(&mut proxy, host, meta);
    apply_network(&mut proxy, host);
    Some(proxy)
}

fn apply_tls(proxy: &mut Value, host: &ProcessedHost, meta: bool) {
    match host.tls.as_str() {
        "tls" => {
            proxy["tls"] = json!(true);
            if !host.sni.is_empty() {
                let key = if matches!(host.credential, Credential::Trojan { .. }) {
                    "sni"
                } else {
                    "servername"
                };
                proxy[key] = json!(host.sni);
            }
            if host.allowinsecure {
                proxy["skip-cert-verify"] = json!(true);
            }
            if let Some(alpn) = &host.alpn {
                let entries: Vec<&str> = alpn.split(',').filter(|s| !s.is_empty()).collect();
                if !entries.is_empty() {
                    proxy["alpn"] = json!(entries);
                }
            }
            if meta {
                if let Some(fp) = &host.fp {
                    proxy["client-fingerprint"] = json!(fp);
                }
            }
        }
        "reality" => {
            // Meta only, non-meta hosts were declined earlier
            proxy["tls"] = json!(true);
            if !host.sni.is_empty() {
                proxy["servername"] = json!(host.sni);
            }
            let mut reality = Map::new();
            if let Some(pbk) = &host.pbk {
                reality.insert("public-key".to_string(), json!(pbk));
            }
            if !host.sid.is_empty() {
                reality.insert("short-id".to_string(), json!(host.sid));
            }
            proxy["reality-opts"] = Value::Object(reality);
            if let Some(fp) = &host.fp {
                proxy["client-fingerprint"] = json!(fp);
            }
        }
        _ => {}
    }
}

fn apply_network(proxy: &mut Value, host: &ProcessedHost) {
    match host.network.as_str() {
        "ws" => {
            proxy["network"] = json!("ws");
            let mut opts = Map::new();
            if !host.path.is_empty() {
                opts.insert("path".to_string(), json!(host.path));
            }
            if !host.host.is_empty() {
                opts.insert("headers".to_string(), json!({"Host": host.host}));
            }
            proxy["ws-opts"] = Value::Object(opts);
        }
        "grpc" | "gun" => {
            proxy["network"] = json!("grpc");
            if !host.path.is_empty() {
                proxy["grpc-opts"] = json!({"grpc-service-name": host.path});
            }
        }
        "http" | "h2" | "h3" => {
            proxy["network"] = json!("h2");
            let mut opts = Map::new();
            if !host.path.is_empty() {
                opts.insert("path".to_string(), json!(host.path));
            }
            if !host.host.is_empty() {
                opts.insert("host".to_string(), json!([host.host]));
            }
            proxy["h2-opts"] = Value::Object(opts);
        }
        _ => {}
    }
}
