//! Raw link output
//!
//! One URI per endpoint following the public VMess/VLESS/Trojan/SS link
//! grammars. Wildcards are already salted by the pipeline; a literal `*`
//! never reaches this layer.

use serde_json::json;
use urlencoding::encode;

use crate::models::Protocol;
use crate::subscription::share::{Credential, ProcessedHost};
use crate::subscription::xray_json::stream_settings;
use crate::utils::base64::{base64_encode, url_safe_base64_encode};

pub fn render(hosts: &[ProcessedHost]) -> String {
    let mut lines: Vec<String> = hosts.iter().map(link).collect();
    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

pub fn link(host: &ProcessedHost) -> String {
    match &host.credential {
        Credential::Vmess { id } => vmess_link(host, &id.to_string()),
        Credential::Vless { id, flow } => vless_link(host, &id.to_string(), flow),
        Credential::Trojan { password } => trojan_link(host, password),
        Credential::Shadowsocks { password, method } => ss_link(host, method, password),
    }
}

fn vless_link(host: &ProcessedHost, id: &str, flow: &str) -> String {
    let mut params = query_params(host);
    if !flow.is_empty() {
        params.push(("flow", flow.to_string()));
    }
    format!(
        "vless://{}@{}:{}?{}#{}",
        id,
        host.address,
        host.port,
        join_params(&params),
        encode(&host.remark)
    )
}

fn trojan_link(host: &ProcessedHost, password: &str) -> String {
    let params = query_params(host);
    format!(
        "trojan://{}@{}:{}?{}#{}",
        encode(password),
        host.address,
        host.port,
        join_params(&params),
        encode(&host.remark)
    )
}

fn ss_link(host: &ProcessedHost, method: &str, password: &str) -> String {
    let userinfo = url_safe_base64_encode(&format!("{}:{}", method, password));
    format!(
        "ss://{}@{}:{}#{}",
        userinfo,
        host.address,
        host.port,
        encode(&host.remark)
    )
}

/// VMess links are a base64 JSON blob per the reference grammar.
fn vmess_link(host: &ProcessedHost, id: &str) -> String {
    let payload = json!({
        "v": "2",
        "ps": host.remark,
        "add": host.address,
        "port": host.port.to_string(),
        "id": id,
        "aid": "0",
        "scy": "auto",
        "net": host.network,
        "type": host.header_type.clone().unwrap_or_else(|| "none".to_string()),
        "host": host.host,
        "path": host.path,
        "tls": if host.tls == "none" { String::new() } else { host.tls.clone() },
        "sni": host.sni,
        "fp": host.fp.clone().unwrap_or_default(),
        "alpn": host.alpn.clone().unwrap_or_default(),
    });
    format!("vmess://{}", base64_encode(&payload.to_string()))
}

fn query_params(host: &ProcessedHost) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&'static str, String)> = vec![
        ("type", host.network.clone()),
        ("security", host.tls.clone()),
    ];

    match host.tls.as_str() {
        "reality" => {
            if let Some(pbk) = &host.pbk {
                params.push(("pbk", pbk.clone()));
            }
            if !host.sid.is_empty() {
                params.push(("sid", host.sid.clone()));
            }
            if !host.sni.is_empty() {
                params.push(("sni", host.sni.clone()));
            }
            if let Some(fp) = &host.fp {
                params.push(("fp", fp.clone()));
            }
            if let Some(spx) = &host.spx {
                params.push(("spx", spx.clone()));
            }
            if let Some(mldsa) = &host.mldsa65_verify {
                params.push(("pqv", mldsa.clone()));
            }
        }
        "tls" => {
            if !host.sni.is_empty() {
                params.push(("sni", host.sni.clone()));
            }
            if let Some(fp) = &host.fp {
                params.push(("fp", fp.clone()));
            }
            if let Some(alpn) = &host.alpn {
                params.push(("alpn", alpn.clone()));
            }
            if host.allowinsecure {
                params.push(("allowInsecure", "1".to_string()));
            }
        }
        _ => {}
    }

    match host.network.as_str() {
        "ws" | "httpupgrade" => {
            if !host.path.is_empty() {
                params.push(("path", host.path.clone()));
            }
            if !host.host.is_empty() {
                params.push(("host", host.host.clone()));
            }
        }
        "splithttp" | "xhttp" => {
            if !host.path.is_empty() {
                params.push(("path", host.path.clone()));
            }
            if !host.host.is_empty() {
                params.push(("host", host.host.clone()));
            }
            if let Some(mode) = &host.mode {
                params.push(("mode", mode.clone()));
            }
        }
        "grpc" | "gun" => {
            if !host.path.is_empty() {
                params.push(("serviceName", host.path.clone()));
            }
            if !host.host.is_empty() {
                params.push(("authority", host.host.clone()));
            }
        }
        "kcp" => {
            if let Some(header_type) = &host.header_type {
                params.push(("headerType", header_type.clone()));
            }
            if !host.path.is_empty() {
                params.push(("seed", host.path.clone()));
            }
        }
        "quic" => {
            if let Some(header_type) = &host.header_type {
                params.push(("headerType", header_type.clone()));
            }
            if !host.host.is_empty() {
                params.push(("quicSecurity", host.host.clone()));
            }
            if !host.path.is_empty() {
                params.push(("key", host.path.clone()));
            }
        }
        "http" | "h2" | "h3" => {
            if !host.path.is_empty() {
                params.push(("path", host.path.clone()));
            }
            if !host.host.is_empty() {
                params.push(("host", host.host.clone()));
            }
        }
        _ => {
            if let Some(header_type) = &host.header_type {
                params.push(("headerType", header_type.clone()));
                if header_type == "http" {
                    if !host.path.is_empty() {
                        params.push(("path", host.path.clone()));
                    }
                    if !host.host.is_empty() {
                        params.push(("host", host.host.clone()));
                    }
                }
            }
        }
    }

    // Split download transport rides along as an Xray-shaped extra block
    if let Some(download) = &host.download {
        let extra = json!({"downloadSettings": stream_settings(download)});
        params.push(("extra", extra.to_string()));
    }

    params
}

fn join_params(params: &[(&'static str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use uuid::Uuid;

    fn endpoint(credential: Credential, protocol: Protocol) -> ProcessedHost {
        ProcessedHost {
            remark: "remark".into(),
            address: "proxy.example.com".into(),
            port: 443,
            protocol,
            network: "tcp".into(),
            tls: "none".into(),
            sni: String::new(),
            host: String::new(),
            path: String::new(),
            header_type: None,
            alpn: None,
            fp: None,
            pbk: None,
            sid: String::new(),
            spx: None,
            mldsa65_verify: None,
            allowinsecure: false,
            mode: None,
            credential,
            fragment_settings: None,
            noise_settings: None,
            http_headers: None,
            mux_settings: None,
            ech_config_list: None,
            random_user_agent: false,
            transport_extra: Map::new(),
            download: None,
        }
    }

    #[test]
    fn test_vless_reality_link_shape() {
        let mut host = endpoint(
            Credential::Vless {
                id: Uuid::nil(),
                flow: "xtls-rprx-vision".into(),
            },
            Protocol::Vless,
        );
        host.tls = "reality".into();
        host.sni = "example.com".into();
        host.pbk = Some("PBKVALUE".into());
        host.sid = "ab".into();
        host.fp = Some("chrome".into());

        let link = link(&host);
        assert_eq!(
            link,
            "vless://00000000-0000-0000-0000-000000000000@proxy.example.com:443\
             ?type=tcp&security=reality&pbk=PBKVALUE&sid=ab&sni=example.com\
             &fp=chrome&flow=xtls-rprx-vision#remark"
        );
    }

    #[test]
    fn test_ss_link_userinfo() {
        let host = endpoint(
            Credential::Shadowsocks {
                password: "secret".into(),
                method: "aes-128-gcm".into(),
            },
            Protocol::Shadowsocks,
        );
        let link = link(&host);
        assert!(link.starts_with("ss://"));
        let userinfo = link
            .strip_prefix("ss://")
            .unwrap()
            .split('@')
            .next()
            .unwrap();
        use base64::{engine::general_purpose, Engine as _};
        let decoded = general_purpose::URL_SAFE_NO_PAD.decode(userinfo).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), "aes-128-gcm:secret");
    }

    #[test]
    fn test_vmess_link_is_base64_json() {
        let host = endpoint(Credential::Vmess { id: Uuid::nil() }, Protocol::Vmess);
        let link = link(&host);
        let blob = link.strip_prefix("vmess://").unwrap();
        let decoded = crate::utils::base64::base64_decode(blob, false);
        let parsed: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(parsed["v"], "2");
        assert_eq!(parsed["add"], "proxy.example.com");
        assert_eq!(parsed["port"], "443");
    }

    #[test]
    fn test_trojan_link_encodes_password() {
        let host = endpoint(
            Credential::Trojan {
                password: "p@ss word".into(),
            },
            Protocol::Trojan,
        );
        let link = link(&host);
        assert!(link.starts_with("trojan://p%40ss%20word@proxy.example.com:443?"));
    }

    #[test]
    fn test_download_extra_param() {
        let mut host = endpoint(
            Credential::Vless {
                id: Uuid::nil(),
                flow: String::new(),
            },
            Protocol::Vless,
        );
        host.network = "xhttp".into();
        let mut inner = host.clone();
        inner.address = "cdn.example.com".into();
        host.download = Some(Box::new(inner));

        let link = link(&host);
        assert!(link.contains("extra="));
        assert!(link.contains("downloadSettings"));
    }

    #[test]
    fn test_empty_host_list() {
        assert_eq!(render(&[]), "");
    }
}
