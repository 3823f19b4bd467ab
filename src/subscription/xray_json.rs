//! Xray JSON client configs
//!
//! One full client config per endpoint, in the shape v2rayN-family clients
//! import: a local socks inbound, the proxy outbound, direct/block and a
//! minimal routing rule set.

use serde_json::{json, Map, Value};

use crate::error::SubscriptionError;
use crate::models::Protocol;
use crate::subscription::share::{Credential, ProcessedHost};

pub fn render(hosts: &[ProcessedHost]) -> Result<String, SubscriptionError> {
    let configs: Vec<Value> = hosts.iter().map(client_config).collect();
    Ok(serde_json::to_string_pretty(&configs)?)
}

fn client_config(host: &ProcessedHost) -> Value {
    let mut outbounds = vec![proxy_outbound(host, "proxy")];

    if host.fragment_settings.is_some() || host.noise_settings.is_some() {
        let mut settings = Map::new();
        if let Some(fragment) = &host.fragment_settings {
            settings.insert("fragment".to_string(), fragment.clone());
        }
        if let Some(noise) = &host.noise_settings {
            settings.insert("noises".to_string(), noise.clone());
        }
        outbounds.push(json!({
            "tag": "dialer",
            "protocol": "freedom",
            "settings": Value::Object(settings)
        }));
        outbounds[0]["streamSettings"]["sockopt"] = json!({"dialerProxy": "dialer"});
    }

    outbounds.push(json!({"tag": "direct", "protocol": "freedom"}));
    outbounds.push(json!({"tag": "block", "protocol": "blackhole"}));

    json!({
        "remarks": host.remark,
        "log": {"loglevel": "warning"},
        "inbounds": [{
            "tag": "socks-in",
            "listen": "127.0.0.1",
            "port": 10808,
            "protocol": "socks",
            "settings": {"udp": true}
        }],
        "outbounds": outbounds,
        "routing": {
            "domainStrategy": "AsIs",
            "rules": [
                {"type": "field", "ip": ["geoip:private"], "outboundTag": "direct"}
            ]
        }
    })
}

/// The proxy outbound for one endpoint.
pub(crate) fn proxy_outbound(host: &ProcessedHost, tag: &str) -> Value {
    let settings = match &host.credential {
        Credential::Vmess { id } => json!({
            "vnext": [{
                "address": host.address,
                "port": host.port,
                "users": [{"id": id.to_string(), "security": "auto"}]
            }]
        }),
        Credential::Vless { id, flow } => {
            let mut user = json!({"id": id.to_string(), "encryption": "none"});
            if !flow.is_empty() {
                user["flow"] = json!(flow);
            }
            json!({
                "vnext": [{
                    "address": host.address,
                    "port": host.port,
                    "users": [user]
                }]
            })
        }
        Credential::Trojan { password } => json!({
            "servers": [{
                "address": host.address,
                "port": host.port,
                "password": password
            }]
        }),
        Credential::Shadowsocks { password, method } => json!({
            "servers": [{
                "address": host.address,
                "port": host.port,
                "method": method,
                "password": password
            }]
        }),
    };

    let mut outbound = json!({
        "tag": tag,
        "protocol": host.protocol.as_str(),
        "settings": settings,
        "streamSettings": stream_settings(host)
    });
    if let Some(mux) = &host.mux_settings {
        outbound["mux"] = mux.clone();
    }
    outbound
}

/// Xray-shaped `streamSettings` for one endpoint. Also used to serialize the
/// split download overlay into links and structured outputs.
pub(crate) fn stream_settings(host: &ProcessedHost) -> Value {
    let mut stream = Map::new();
    stream.insert("network".to_string(), json!(host.network));
    stream.insert("security".to_string(), json!(host.tls));

    match host.tls.as_str() {
        "tls" => {
            let mut tls = Map::new();
            if !host.sni.is_empty() {
                tls.insert("serverName".to_string(), json!(host.sni));
            }
            if let Some(alpn) = &host.alpn {
                let entries: Vec<&str> = alpn.split(',').filter(|s| !s.is_empty()).collect();
                if !entries.is_empty() {
                    tls.insert("alpn".to_string(), json!(entries));
                }
            }
            if let Some(fp) = &host.fp {
                tls.insert("fingerprint".to_string(), json!(fp));
            }
            if host.allowinsecure {
                tls.insert("allowInsecure".to_string(), json!(true));
            }
            if let Some(ech) = &host.ech_config_list {
                tls.insert("echConfigList".to_string(), json!(ech));
            }
            stream.insert("tlsSettings".to_string(), Value::Object(tls));
        }
        "reality" => {
            let mut reality = Map::new();
            if !host.sni.is_empty() {
                reality.insert("serverName".to_string(), json!(host.sni));
            }
            if let Some(pbk) = &host.pbk {
                reality.insert("publicKey".to_string(), json!(pbk));
            }
            if !host.sid.is_empty() {
                reality.insert("shortId".to_string(), json!(host.sid));
            }
            if let Some(fp) = &host.fp {
                reality.insert("fingerprint".to_string(), json!(fp));
            }
            if let Some(spx) = &host.spx {
                reality.insert("spiderX".to_string(), json!(spx));
            }
            if let Some(mldsa) = &host.mldsa65_verify {
                reality.insert("mldsa65Verify".to_string(), json!(mldsa));
            }
            stream.insert("realitySettings".to_string(), Value::Object(reality));
        }
        _ => {}
    }

    let (key, transport) = transport_block(host);
    if let Some(key) = key {
        stream.insert(key, transport);
    }

    if let Some(download) = &host.download {
        stream.insert("downloadSettings".to_string(), stream_settings(download));
    }

    Value::Object(stream)
}

fn transport_block(host: &ProcessedHost) -> (Option<String>, Value) {
    let mut block = Map::new();
    match host.network.as_str() {
        "ws" => {
            if !host.path.is_empty() {
                block.insert("path".to_string(), json!(host.path));
            }
            if !host.host.is_empty() {
                block.insert("host".to_string(), json!(host.host));
            }
            (Some("wsSettings".to_string()), finish(block, host))
        }
        "grpc" | "gun" => {
            if !host.path.is_empty() {
                block.insert("serviceName".to_string(), json!(host.path));
            }
            if !host.host.is_empty() {
                block.insert("authority".to_string(), json!(host.host));
            }
            (Some("grpcSettings".to_string()), finish(block, host))
        }
        "kcp" => {
            if !host.path.is_empty() {
                block.insert("seed".to_string(), json!(host.path));
            }
            if let Some(header_type) = &host.header_type {
                block.insert("header".to_string(), json!({"type": header_type}));
            }
            (Some("kcpSettings".to_string()), finish(block, host))
        }
        "quic" => {
            if !host.host.is_empty() {
                block.insert("security".to_string(), json!(host.host));
            }
            if !host.path.is_empty() {
                block.insert("key".to_string(), json!(host.path));
            }
            if let Some(header_type) = &host.header_type {
                block.insert("header".to_string(), json!({"type": header_type}));
            }
            (Some("quicSettings".to_string()), finish(block, host))
        }
        "httpupgrade" => {
            if !host.path.is_empty() {
                block.insert("path".to_string(), json!(host.path));
            }
            if !host.host.is_empty() {
                block.insert("host".to_string(), json!(host.host));
            }
            (Some("httpupgradeSettings".to_string()), finish(block, host))
        }
        "splithttp" | "xhttp" => {
            if !host.path.is_empty() {
                block.insert("path".to_string(), json!(host.path));
            }
            if !host.host.is_empty() {
                block.insert("host".to_string(), json!(host.host));
            }
            if let Some(mode) = &host.mode {
                block.insert("mode".to_string(), json!(mode));
            }
            (Some("xhttpSettings".to_string()), finish(block, host))
        }
        "http" | "h2" | "h3" => {
            if !host.path.is_empty() {
                block.insert("path".to_string(), json!(host.path));
            }
            if !host.host.is_empty() {
                block.insert("host".to_string(), json!([host.host]));
            }
            (Some("httpSettings".to_string()), finish(block, host))
        }
        "tcp" | "raw" => {
            if let Some(header_type) = &host.header_type {
                let mut header = Map::new();
                header.insert("type".to_string(), json!(header_type));
                if header_type == "http" {
                    let mut request = Map::new();
                    if !host.path.is_empty() {
                        request.insert("path".to_string(), json!([host.path]));
                    }
                    if !host.host.is_empty() {
                        request
                            .insert("headers".to_string(), json!({"Host": [host.host]}));
                    }
                    header.insert("request".to_string(), Value::Object(request));
                }
                block.insert("header".to_string(), Value::Object(header));
            }
            if block.is_empty() {
                (None, Value::Null)
            } else {
                (Some("tcpSettings".to_string()), finish(block, host))
            }
        }
        _ => (None, Value::Null),
    }
}

/// Layer the folded per-transport overrides over the generated block.
fn finish(mut block: Map<String, Value>, host: &ProcessedHost) -> Value {
    for (key, value) in &host.transport_extra {
        if key == "header_type" || key == "path" || key == "host" || key == "mode" {
            continue; // already merged into the endpoint fields
        }
        block.insert(key.clone(), value.clone());
    }
    if let Some(headers) = &host.http_headers {
        if matches!(host.network.as_str(), "ws" | "httpupgrade" | "splithttp" | "xhttp") {
            block.insert("headers".to_string(), json!(headers));
        }
    }
    Value::Object(block)
}
