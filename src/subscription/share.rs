//! Per-host merge pipeline
//!
//! Combines exactly one host override with exactly one inbound descriptor
//! and the user's credentials into a concrete endpoint ready for the format
//! adapters. Hosts that cannot be resolved are skipped, never fatal.

use std::collections::HashMap;

use log::debug;
use rand::Rng;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::core::CoreMap;
use crate::models::{InboundHost, Protocol, User};
use crate::utils::random::{choose, choose_salted};
use crate::utils::string::format_template;

/// Per-protocol credential of the rendered endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Credential {
    Vmess { id: Uuid },
    Vless { id: Uuid, flow: String },
    Trojan { password: String },
    Shadowsocks { password: String, method: String },
}

/// A fully merged endpoint. One host override and one inbound descriptor,
/// with every random selection already made.
#[derive(Debug, Clone)]
pub struct ProcessedHost {
    pub remark: String,
    pub address: String,
    pub port: u16,
    pub protocol: Protocol,
    pub network: String,
    pub tls: String,
    pub sni: String,
    pub host: String,
    pub path: String,
    pub header_type: Option<String>,
    pub alpn: Option<String>,
    pub fp: Option<String>,
    pub pbk: Option<String>,
    pub sid: String,
    pub spx: Option<String>,
    pub mldsa65_verify: Option<String>,
    pub allowinsecure: bool,
    pub mode: Option<String>,
    pub credential: Credential,
    pub fragment_settings: Option<Value>,
    pub noise_settings: Option<Value>,
    pub http_headers: Option<HashMap<String, String>>,
    pub mux_settings: Option<Value>,
    pub ech_config_list: Option<String>,
    pub random_user_agent: bool,
    /// Folded per-transport override map, `type` already renamed to
    /// `header_type`. Carried for the structured formats.
    pub transport_extra: Map<String, Value>,
    /// Split download transport overlay.
    pub download: Option<Box<ProcessedHost>>,
}

/// Run the pipeline over every host in storage order.
pub fn process_hosts(
    user: &User,
    hosts: &[InboundHost],
    cores: &CoreMap,
    vars: &HashMap<String, String>,
    filter_by_status: bool,
    rng: &mut impl Rng,
) -> Vec<ProcessedHost> {
    let mut out = Vec::new();
    for host in hosts {
        if filter_by_status && !host.admits(user.status) {
            continue;
        }
        if let Some(processed) = process_host(user, host, cores, vars, rng) {
            out.push(processed);
        }
    }
    out
}

/// Merge one host with its inbound descriptor for one user. `None` when the
/// host does not apply (unknown tag, not in the user's inbounds, missing
/// credential).
pub fn process_host(
    user: &User,
    host: &InboundHost,
    cores: &CoreMap,
    vars: &HashMap<String, String>,
    rng: &mut impl Rng,
) -> Option<ProcessedHost> {
    if !user.inbounds.contains(&host.inbound_tag) {
        return None;
    }
    let Some(inbound) = cores.get_inbound(&host.inbound_tag) else {
        debug!(
            "host '{}' references unknown inbound tag '{}', skipped",
            host.remark, host.inbound_tag
        );
        return None;
    };

    let credential = match inbound.protocol {
        Protocol::Vmess => {
            let vmess = user.proxies.vmess.as_ref()?;
            Credential::Vmess { id: vmess.id }
        }
        Protocol::Vless => {
            let vless = user.proxies.vless.as_ref()?;
            let mut flow = vless.flow.clone();
            // Adopt the inbound's default flow unless it is explicitly none
            if flow.is_empty() {
                if let Some(inbound_flow) = &inbound.flow {
                    if inbound_flow != "none" {
                        flow = inbound_flow.clone();
                    }
                }
            }
            Credential::Vless { id: vless.id, flow }
        }
        Protocol::Trojan => {
            let trojan = user.proxies.trojan.as_ref()?;
            Credential::Trojan {
                password: trojan.password.clone(),
            }
        }
        Protocol::Shadowsocks => {
            let ss = user.proxies.shadowsocks.as_ref()?;
            Credential::Shadowsocks {
                password: ss.password.clone(),
                method: inbound
                    .method
                    .clone()
                    .unwrap_or_else(|| ss.method.clone()),
            }
        }
    };

    let mut vars = vars.clone();
    vars.insert("PROTOCOL".to_string(), inbound.protocol.to_string());
    vars.insert("TRANSPORT".to_string(), inbound.network.clone());

    let sni_pool = if host.sni.is_empty() {
        &inbound.sni
    } else {
        &host.sni
    };
    let host_pool = if host.host.is_empty() {
        &inbound.host
    } else {
        &host.host
    };
    let sni = choose_salted(rng, sni_pool);
    let mut host_header = choose_salted(rng, host_pool);
    let address = choose_salted(rng, &host.address);

    let sid = choose(rng, &inbound.sids).cloned().unwrap_or_default();

    let path_template = host.path.as_deref().or(inbound.path.as_deref());
    let path = path_template
        .map(|t| format_template(t, &vars))
        .unwrap_or_default();

    // Applied after salting; an empty SNI leaves the host untouched
    if host.use_sni_as_host && !sni.is_empty() {
        host_header = sni.clone();
    }

    let mut processed = ProcessedHost {
        remark: format_template(&host.remark, &vars),
        address,
        port: host.port.unwrap_or(inbound.port),
        protocol: inbound.protocol,
        network: inbound.network.clone(),
        tls: host
            .security
            .clone()
            .filter(|s| !s.is_empty() && s != "inbound_default")
            .unwrap_or_else(|| inbound.tls.clone()),
        sni,
        host: host_header,
        path,
        header_type: inbound.header_type.clone(),
        alpn: host.alpn.clone(),
        fp: host.fingerprint.clone().or_else(|| inbound.fp.clone()),
        pbk: inbound.pbk.clone(),
        sid,
        spx: inbound.spx.clone(),
        mldsa65_verify: inbound.mldsa65_verify.clone(),
        allowinsecure: host.allowinsecure,
        mode: inbound.mode.clone(),
        credential,
        fragment_settings: host.fragment_settings.clone(),
        noise_settings: host.noise_settings.clone(),
        http_headers: host.http_headers.clone(),
        mux_settings: host.mux_settings.clone(),
        ech_config_list: host.ech_config_list.clone(),
        random_user_agent: host.random_user_agent,
        transport_extra: Map::new(),
        download: None,
    };

    fold_transport_settings(&mut processed, host);

    if let Some(download_host) = &host.download_settings {
        processed.download = process_host(user, download_host, cores, &vars, rng).map(Box::new);
    }

    Some(processed)
}

/// Fold `transport_settings[<network>]` into the endpoint, renaming `type`
/// to `header_type`. Recognized keys update the merged fields; the whole
/// map is kept for the structured formats.
fn fold_transport_settings(processed: &mut ProcessedHost, host: &InboundHost) {
    let Some(Value::Object(settings)) = host.transport_settings.get(&processed.network) else {
        return;
    };
    for (key, value) in settings {
        let key = if key == "type" { "header_type" } else { key.as_str() };
        match (key, value) {
            ("header_type", Value::String(s)) => processed.header_type = Some(s.clone()),
            ("path", Value::String(s)) => processed.path = s.clone(),
            ("host", Value::String(s)) => processed.host = s.clone(),
            ("mode", Value::String(s)) => processed.mode = Some(s.clone()),
            _ => {}
        }
        processed
            .transport_extra
            .insert(key.to_string(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CoreRegistry;
    use crate::models::user::{ProxySettings, VlessSettings};
    use crate::models::UserStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn registry() -> CoreRegistry {
        let registry = CoreRegistry::new();
        registry
            .update(
                "main",
                json!({
                    "inbounds": [{
                        "tag": "vless-tcp", "protocol": "vless", "port": 443,
                        "streamSettings": {
                            "network": "tcp", "security": "reality",
                            "realitySettings": {
                                "privateKey": crate::utils::base64::url_safe_base64_encode_bytes(&[9u8; 32]),
                                "serverNames": ["example.com"],
                                "shortIds": ["ab"]
                            }
                        }
                    }],
                    "outbounds": [{"tag": "direct", "protocol": "freedom"}]
                }),
                &[],
                &[],
            )
            .unwrap();
        registry
    }

    fn user() -> User {
        User {
            username: "alice".into(),
            status: UserStatus::Active,
            proxies: ProxySettings {
                vless: Some(VlessSettings {
                    id: Uuid::nil(),
                    flow: String::new(),
                }),
                ..Default::default()
            },
            inbounds: vec!["vless-tcp".into()],
            used_traffic: 0,
            data_limit: None,
            expire: None,
            on_hold_expire_duration: None,
            admin: None,
        }
    }

    fn host() -> InboundHost {
        let mut h = InboundHost::for_tag("vless-tcp");
        h.remark = "{USERNAME} node".into();
        h.address = vec!["proxy.example.com".into()];
        h
    }

    #[test]
    fn test_merges_inbound_and_host() {
        let registry = registry();
        let snap = registry.snapshot();
        let vars = HashMap::from([("USERNAME".to_string(), "alice".to_string())]);
        let mut rng = StdRng::seed_from_u64(7);

        let p = process_host(&user(), &host(), &snap, &vars, &mut rng).unwrap();
        assert_eq!(p.remark, "alice node");
        assert_eq!(p.address, "proxy.example.com");
        assert_eq!(p.port, 443);
        assert_eq!(p.tls, "reality");
        assert_eq!(p.sni, "example.com");
        assert_eq!(p.sid, "ab");
        assert_eq!(p.fp.as_deref(), Some("chrome"));
    }

    #[test]
    fn test_skips_host_outside_user_inbounds() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut u = user();
        u.inbounds.clear();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(process_host(&u, &host(), &snap, &HashMap::new(), &mut rng).is_none());
    }

    #[test]
    fn test_skips_host_with_unknown_tag() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut u = user();
        u.inbounds = vec!["ghost".into()];
        let mut rng = StdRng::seed_from_u64(7);
        let h = InboundHost::for_tag("ghost");
        assert!(process_host(&u, &h, &snap, &HashMap::new(), &mut rng).is_none());
    }

    #[test]
    fn test_skips_user_without_credential() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut u = user();
        u.proxies.vless = None;
        let mut rng = StdRng::seed_from_u64(7);
        assert!(process_host(&u, &host(), &snap, &HashMap::new(), &mut rng).is_none());
    }

    #[test]
    fn test_status_filter() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut h = host();
        h.status = vec![UserStatus::Active];

        let mut limited = user();
        limited.status = UserStatus::Limited;
        let mut rng = StdRng::seed_from_u64(7);
        let hosts = vec![h.clone()];

        let dropped = process_hosts(&limited, &hosts, &snap, &HashMap::new(), true, &mut rng);
        assert!(dropped.is_empty());

        let kept = process_hosts(&user(), &hosts, &snap, &HashMap::new(), true, &mut rng);
        assert_eq!(kept.len(), 1);

        // filter disabled: visible regardless of status
        let visible = process_hosts(&limited, &hosts, &snap, &HashMap::new(), false, &mut rng);
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn test_use_sni_as_host_after_salting() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut h = host();
        h.sni = vec!["sni.example.com".into()];
        h.host = vec!["host.example.com".into()];
        h.use_sni_as_host = true;
        let mut rng = StdRng::seed_from_u64(7);

        let p = process_host(&user(), &h, &snap, &HashMap::new(), &mut rng).unwrap();
        assert_eq!(p.host, "sni.example.com");
    }

    #[test]
    fn test_transport_settings_fold_renames_type() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut h = host();
        h.transport_settings.insert(
            "tcp".to_string(),
            json!({"type": "http", "path": "/override"}),
        );
        let mut rng = StdRng::seed_from_u64(7);

        let p = process_host(&user(), &h, &snap, &HashMap::new(), &mut rng).unwrap();
        assert_eq!(p.header_type.as_deref(), Some("http"));
        assert_eq!(p.path, "/override");
        assert!(p.transport_extra.contains_key("header_type"));
        assert!(!p.transport_extra.contains_key("type"));
    }

    #[test]
    fn test_download_settings_recursion() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut h = host();
        let mut dl = InboundHost::for_tag("vless-tcp");
        dl.address = vec!["cdn.example.com".into()];
        h.download_settings = Some(Box::new(dl));
        let mut rng = StdRng::seed_from_u64(7);

        let p = process_host(&user(), &h, &snap, &HashMap::new(), &mut rng).unwrap();
        let download = p.download.expect("download overlay processed");
        assert_eq!(download.address, "cdn.example.com");
    }

    #[test]
    fn test_wildcard_salting() {
        let registry = registry();
        let snap = registry.snapshot();
        let mut h = host();
        h.address = vec!["*.example.com".into()];
        let mut rng = StdRng::seed_from_u64(7);

        let p = process_host(&user(), &h, &snap, &HashMap::new(), &mut rng).unwrap();
        assert!(!p.address.contains('*'));
        assert!(p.address.ends_with(".example.com"));
    }
}
