//! Inbound descriptor resolution
//!
//! Distills one raw Xray inbound into a normalized [`InboundDescriptor`]
//! covering protocol, transport, TLS/Reality material, SNI, host, path and
//! fallback lineage. Descriptors are immutable once resolved; a config
//! change recreates the whole set.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::ConfigError;
use crate::models::Protocol;
use crate::utils::base64::is_valid_base64;
use crate::utils::crypto::{get_cert_sans, reality_public_key};

/// Sentinel joining a fallback parent tag to its child in synthetic tags.
/// Private wire detail, user-visible tags must never contain it.
pub const FALLBACK_JOIN: &str = "<=>";

/// Normalized view of one inbound, the unit the host template engine and the
/// subscription renderer work from.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundDescriptor {
    pub tag: String,
    pub protocol: Protocol,
    pub port: u16,
    pub network: String,
    /// One of `none`, `tls`, `reality`.
    pub tls: String,
    /// SNI candidates, from certificate SANs or Reality server names.
    pub sni: Vec<String>,
    pub host: Vec<String>,
    /// Transport dependent: URL path, gRPC service name, KCP seed, QUIC key.
    pub path: Option<String>,
    pub header_type: Option<String>,
    /// Default VLESS flow advertised by the inbound.
    pub flow: Option<String>,
    /// SplitHTTP/XHTTP mode.
    pub mode: Option<String>,
    /// True when this inbound shares its socket with a parent through the
    /// fallbacks mechanism.
    pub is_fallback: bool,
    /// Tags of the parent inbounds that fall back into this one.
    pub fallbacks: Vec<String>,
    // Reality
    pub pbk: Option<String>,
    pub sids: Vec<String>,
    pub spx: Option<String>,
    pub fp: Option<String>,
    pub mldsa65_verify: Option<String>,
    // Shadowsocks
    pub method: Option<String>,
    pub is_2022: bool,
    pub password: Option<String>,
}

impl InboundDescriptor {
    fn base(tag: String, protocol: Protocol, port: u16) -> Self {
        InboundDescriptor {
            tag,
            protocol,
            port,
            network: "tcp".to_string(),
            tls: "none".to_string(),
            sni: Vec::new(),
            host: Vec::new(),
            path: None,
            header_type: None,
            flow: None,
            mode: None,
            is_fallback: false,
            fallbacks: Vec::new(),
            pbk: None,
            sids: Vec::new(),
            spx: None,
            fp: None,
            mldsa65_verify: None,
            method: None,
            is_2022: false,
            password: None,
        }
    }
}

fn tag_of(value: &Value) -> String {
    value
        .get("tag")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn as_port(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// String form used for fallback `dest` comparison; numbers and strings
/// compare equal when they spell the same value.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// `host` style fields appear both as a scalar and as a list in the wild.
fn string_or_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Find the fallback parents whose `fallbacks[].dest` routes into `inbound`.
fn find_fallback_parents(
    inbound: &Value,
    all_inbounds: &[Value],
    fallback_tags: &HashSet<String>,
) -> Vec<String> {
    let tag = tag_of(inbound);
    let listen = inbound.get("listen").and_then(scalar_string);
    let port = inbound.get("port").and_then(scalar_string);

    let mut parents = Vec::new();
    for parent in all_inbounds {
        let parent_tag = tag_of(parent);
        if parent_tag == tag || !fallback_tags.contains(&parent_tag) {
            continue;
        }
        let fallbacks = parent
            .pointer("/settings/fallbacks")
            .and_then(Value::as_array);
        let Some(fallbacks) = fallbacks else {
            continue;
        };
        let routed = fallbacks.iter().any(|fb| {
            let dest = fb.get("dest").and_then(scalar_string);
            dest.is_some() && (dest == listen || dest == port)
        });
        if routed {
            parents.push(parent_tag);
        }
    }
    parents
}

/// Resolve one raw inbound into a descriptor.
///
/// Returns `Ok(None)` for protocols outside the supported set. Fallback
/// children inherit the first matching parent's port and record the parent
/// lineage; expansion into synthetic inbounds happens in the config layer.
pub(crate) fn resolve_inbound(
    inbound: &Value,
    all_inbounds: &[Value],
    fallback_tags: &HashSet<String>,
) -> Result<Option<InboundDescriptor>, ConfigError> {
    let tag = tag_of(inbound);
    let protocol = inbound.get("protocol").and_then(Value::as_str).unwrap_or("");
    let Some(protocol) = Protocol::from_str(protocol) else {
        return Ok(None);
    };

    let mut is_fallback = false;
    let mut parents = Vec::new();
    let port = match inbound.get("port").and_then(as_port) {
        Some(p) if p >= 1 => p,
        _ => {
            parents = find_fallback_parents(inbound, all_inbounds, fallback_tags);
            if parents.is_empty() {
                return Err(ConfigError::inbound(
                    &tag,
                    "no port and no fallback parent routes into it",
                ));
            }
            is_fallback = true;
            let parent = all_inbounds
                .iter()
                .find(|p| tag_of(p) == parents[0])
                .expect("parent came from this list");
            parent.get("port").and_then(as_port).ok_or_else(|| {
                ConfigError::inbound(&parents[0], "fallback parent has no usable port")
            })?
        }
    };

    let mut desc = InboundDescriptor::base(tag.clone(), protocol, port);
    desc.is_fallback = is_fallback;
    desc.fallbacks = parents;

    let settings = inbound.get("settings").cloned().unwrap_or(Value::Null);

    if protocol == Protocol::Shadowsocks {
        resolve_shadowsocks(&mut desc, &settings)?;
    }
    if protocol == Protocol::Vless {
        desc.flow = string_field(&settings, "flow").or_else(|| {
            settings
                .pointer("/clients/0/flow")
                .and_then(Value::as_str)
                .map(str::to_string)
        });
    }

    if let Some(stream) = inbound.get("streamSettings") {
        resolve_stream(&mut desc, stream)?;
    }

    Ok(Some(desc))
}

fn resolve_shadowsocks(desc: &mut InboundDescriptor, settings: &Value) -> Result<(), ConfigError> {
    let method = string_field(settings, "method").or_else(|| {
        settings
            .pointer("/clients/0/method")
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    let password = string_field(settings, "password").or_else(|| {
        settings
            .pointer("/clients/0/password")
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    if let Some(method) = &method {
        if method == "2022-blake3-chacha20-poly1305" {
            return Err(ConfigError::inbound(
                &desc.tag,
                "shadowsocks method 2022-blake3-chacha20-poly1305 is not supported",
            ));
        }
        if method.starts_with("2022-blake3-") {
            desc.is_2022 = true;
            match &password {
                Some(p) if is_valid_base64(p) => {}
                Some(_) => {
                    return Err(ConfigError::inbound(
                        &desc.tag,
                        "shadowsocks 2022 password must be valid base64",
                    ))
                }
                None => {
                    return Err(ConfigError::inbound(
                        &desc.tag,
                        "shadowsocks 2022 inbound requires a password",
                    ))
                }
            }
        }
    }

    desc.method = method;
    desc.password = password;
    Ok(())
}

fn resolve_stream(desc: &mut InboundDescriptor, stream: &Value) -> Result<(), ConfigError> {
    if let Some(network) = stream.get("network").and_then(Value::as_str) {
        desc.network = network.to_string();
    }

    // http/h2/h3 all read their transport block from httpSettings
    let net_key = match desc.network.as_str() {
        "http" | "h2" | "h3" => "httpSettings".to_string(),
        other => format!("{}Settings", other),
    };
    let net_settings = stream.get(&net_key).cloned().unwrap_or(Value::Null);

    resolve_transport(desc, &net_settings)?;

    let security = stream.get("security").and_then(Value::as_str).unwrap_or("");
    match security {
        "tls" => {
            desc.tls = "tls".to_string();
            if let Some(tls_settings) = stream.get("tlsSettings") {
                collect_certificate_sans(desc, tls_settings);
            }
        }
        "reality" => {
            desc.tls = "reality".to_string();
            let reality = stream.get("realitySettings").cloned().unwrap_or(Value::Null);
            resolve_reality(desc, &reality)?;
        }
        _ => {}
    }

    Ok(())
}

fn collect_certificate_sans(desc: &mut InboundDescriptor, tls_settings: &Value) {
    let Some(certs) = tls_settings.get("certificates").and_then(Value::as_array) else {
        return;
    };
    for cert in certs {
        let pem = match cert.get("certificate") {
            Some(Value::Array(lines)) => lines
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
            Some(Value::String(s)) => s.clone(),
            _ => continue,
        };
        desc.sni.extend(get_cert_sans(&pem));
    }
}

fn resolve_reality(desc: &mut InboundDescriptor, reality: &Value) -> Result<(), ConfigError> {
    let private_key = reality
        .get("privateKey")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::inbound(&desc.tag, "reality inbound has no privateKey"))?;
    desc.pbk = Some(reality_public_key(private_key)?);

    desc.sni
        .extend(string_or_list(reality.get("serverNames")));

    desc.sids = string_or_list(reality.get("shortIds"));
    if desc.sids.is_empty() {
        return Err(ConfigError::inbound(
            &desc.tag,
            "reality inbound requires at least one shortId",
        ));
    }

    desc.spx = string_field(reality, "spiderX");
    desc.fp = Some("chrome".to_string());
    desc.mldsa65_verify = string_field(reality, "mldsa65Verify");
    Ok(())
}

fn resolve_transport(desc: &mut InboundDescriptor, settings: &Value) -> Result<(), ConfigError> {
    match desc.network.as_str() {
        "tcp" | "raw" => {
            desc.header_type = settings
                .pointer("/header/type")
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(request) = settings.pointer("/header/request") {
                // Only the first configured path is kept
                desc.path = request
                    .pointer("/path/0")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| string_field(request, "path"));
                if let Some(host) = request.pointer("/headers/Host") {
                    match host {
                        Value::Array(_) => desc.host = string_or_list(Some(host)),
                        _ => {
                            return Err(ConfigError::inbound(
                                &desc.tag,
                                "tcp header Host must be a list",
                            ))
                        }
                    }
                }
            }
        }
        "ws" => {
            desc.path = string_field(settings, "path");
            let host = string_field(settings, "host")
                .or_else(|| {
                    settings
                        .pointer("/headers/Host")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_default();
            if !host.is_empty() {
                desc.host = vec![host];
            }
        }
        "grpc" | "gun" => {
            desc.path = string_field(settings, "serviceName");
            if let Some(authority) = string_field(settings, "authority") {
                desc.host = vec![authority];
            }
        }
        "quic" => {
            desc.header_type = settings
                .pointer("/header/type")
                .and_then(Value::as_str)
                .map(str::to_string);
            desc.path = string_field(settings, "key");
            if let Some(security) = string_field(settings, "security") {
                desc.host = vec![security];
            }
        }
        "httpupgrade" => {
            desc.path = string_field(settings, "path");
            if let Some(host) = string_field(settings, "host") {
                desc.host = vec![host];
            }
        }
        "splithttp" | "xhttp" => {
            desc.path = string_field(settings, "path");
            if let Some(host) = string_field(settings, "host") {
                desc.host = vec![host];
            }
            desc.mode = Some(
                string_field(settings, "mode").unwrap_or_else(|| "auto".to_string()),
            );
        }
        "kcp" => {
            desc.header_type = settings
                .pointer("/header/type")
                .and_then(Value::as_str)
                .map(str::to_string);
            if let Some(domain) = settings.pointer("/header/domain").and_then(Value::as_str) {
                desc.host = vec![domain.to_string()];
            }
            desc.path = string_field(settings, "seed");
        }
        "http" | "h2" | "h3" => {
            desc.host = string_or_list(settings.get("host"));
            desc.path = string_field(settings, "path");
        }
        _ => {
            // Unknown transport keyword: best-effort extraction
            desc.path = string_field(settings, "path");
            desc.host = string_or_list(settings.get("host"));
        }
    }
    Ok(())
}

/// Materialize the synthetic inbound `parent<=>child`: the child's payload on
/// the parent's port, wrapped in the parent's TLS/Reality material.
pub(crate) fn synthesize_fallback_child(parent: &Value, child: &Value) -> Value {
    let mut synth = child.clone();
    let synth_tag = format!("{}{}{}", tag_of(parent), FALLBACK_JOIN, tag_of(child));
    synth["tag"] = Value::String(synth_tag);

    if let Some(port) = parent.get("port") {
        synth["port"] = port.clone();
    }

    let parent_stream = parent.get("streamSettings").cloned().unwrap_or(Value::Null);
    let security = parent_stream
        .get("security")
        .and_then(Value::as_str)
        .unwrap_or("none")
        .to_string();

    if !synth.get("streamSettings").map(Value::is_object).unwrap_or(false) {
        synth["streamSettings"] = Value::Object(serde_json::Map::new());
    }
    let stream = synth
        .get_mut("streamSettings")
        .and_then(Value::as_object_mut)
        .expect("just ensured an object");

    stream.insert("security".to_string(), Value::String(security.clone()));
    let sec_key = format!("{}Settings", security);
    if let Some(material) = parent_stream.get(&sec_key) {
        stream.insert(sec_key, material.clone());
    }

    synth
}
