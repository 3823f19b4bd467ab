//! Xray engine configuration
//!
//! Two views of the same document: the opaque `RawConfig` value handed
//! verbatim to the engine fleet (with certificate files inlined), and the
//! resolved, immutable inbound descriptor set the renderer works from. The
//! raw value is never mutated after construction.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::debug;
use serde_json::Value;

use crate::error::ConfigError;
use crate::xray::inbound::{resolve_inbound, synthesize_fallback_child, InboundDescriptor};

#[derive(Debug, Clone)]
pub struct XrayConfig {
    raw: Value,
    inbounds: Vec<InboundDescriptor>,
    by_tag: HashMap<String, usize>,
}

impl XrayConfig {
    /// Parse a JSON (or JSON-with-comments) string.
    pub fn from_str(
        source: &str,
        exclude_tags: &[String],
        fallback_tags: &[String],
    ) -> Result<Self, ConfigError> {
        let stripped = strip_json_comments(source);
        let value: Value = serde_json::from_str(&stripped)?;
        Self::from_value(value, exclude_tags, fallback_tags)
    }

    /// Parse from a file on disk.
    pub fn from_file(
        path: &Path,
        exclude_tags: &[String],
        fallback_tags: &[String],
    ) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_str(&source, exclude_tags, fallback_tags)
    }

    /// Build from an already parsed mapping. The value is deep-copied before
    /// any mutation (certificate inlining), the caller's copy stays intact.
    pub fn from_value(
        value: Value,
        exclude_tags: &[String],
        fallback_tags: &[String],
    ) -> Result<Self, ConfigError> {
        let mut raw = value;
        validate(&raw)?;
        inline_certificate_files(&mut raw)?;

        let exclude: HashSet<String> = exclude_tags.iter().cloned().collect();
        let fallback: HashSet<String> = fallback_tags.iter().cloned().collect();
        let inbounds = resolve_all(&raw, &exclude, &fallback)?;

        let mut by_tag = HashMap::with_capacity(inbounds.len());
        for (idx, inbound) in inbounds.iter().enumerate() {
            by_tag.insert(inbound.tag.clone(), idx);
        }

        Ok(XrayConfig {
            raw,
            inbounds,
            by_tag,
        })
    }

    /// Resolved descriptors in configuration order.
    pub fn inbounds(&self) -> &[InboundDescriptor] {
        &self.inbounds
    }

    pub fn inbounds_by_tag(&self) -> impl Iterator<Item = (&str, &InboundDescriptor)> {
        self.inbounds.iter().map(|i| (i.tag.as_str(), i))
    }

    pub fn get_inbound(&self, tag: &str) -> Option<&InboundDescriptor> {
        self.by_tag.get(tag).map(|&idx| &self.inbounds[idx])
    }

    /// Raw outbound object by tag, straight from the engine config.
    pub fn get_outbound(&self, tag: &str) -> Option<&Value> {
        self.raw
            .get("outbounds")
            .and_then(Value::as_array)?
            .iter()
            .find(|o| o.get("tag").and_then(Value::as_str) == Some(tag))
    }

    /// The pass-through engine config, certificates inlined, for the node
    /// supervisor.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn render_json(&self) -> String {
        serde_json::to_string(&self.raw).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Validation per the admin contract: both halves present and non-empty,
/// every entry tagged, inbound tags free of the reserved characters.
fn validate(raw: &Value) -> Result<(), ConfigError> {
    for key in ["inbounds", "outbounds"] {
        let entries = raw
            .get(key)
            .and_then(Value::as_array)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ConfigError::Invalid(format!("config has no {}", key)))?;

        for entry in entries {
            let tag = entry.get("tag").and_then(Value::as_str).unwrap_or("");
            if tag.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "every {} entry needs a non-empty tag",
                    key
                )));
            }
            if key == "inbounds" && (tag.contains(',') || tag.contains("<=>")) {
                return Err(ConfigError::Invalid(format!(
                    "inbound tag '{}' contains a reserved character",
                    tag
                )));
            }
        }
    }
    Ok(())
}

/// Replace `certificateFile`/`keyFile` pairs with inline line arrays so the
/// serialized config is self-contained when shipped to a node.
fn inline_certificate_files(raw: &mut Value) -> Result<(), ConfigError> {
    let Some(inbounds) = raw.get_mut("inbounds").and_then(Value::as_array_mut) else {
        return Ok(());
    };
    for inbound in inbounds {
        let Some(certs) = inbound
            .pointer_mut("/streamSettings/tlsSettings/certificates")
            .and_then(Value::as_array_mut)
        else {
            continue;
        };
        for cert in certs {
            let Some(obj) = cert.as_object_mut() else {
                continue;
            };
            let cert_file = obj.get("certificateFile").and_then(Value::as_str);
            let key_file = obj.get("keyFile").and_then(Value::as_str);
            let (Some(cert_file), Some(key_file)) = (cert_file, key_file) else {
                continue;
            };
            let cert_content = std::fs::read_to_string(cert_file)?;
            let key_content = std::fs::read_to_string(key_file)?;
            obj.insert("certificate".to_string(), lines_value(&cert_content));
            obj.insert("key".to_string(), lines_value(&key_content));
            obj.remove("certificateFile");
            obj.remove("keyFile");
        }
    }
    Ok(())
}

fn lines_value(content: &str) -> Value {
    Value::Array(
        content
            .lines()
            .map(|l| Value::String(l.to_string()))
            .collect(),
    )
}

fn resolve_all(
    raw: &Value,
    exclude: &HashSet<String>,
    fallback_tags: &HashSet<String>,
) -> Result<Vec<InboundDescriptor>, ConfigError> {
    let all: Vec<Value> = raw
        .get("inbounds")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut out: Vec<InboundDescriptor> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for inbound in &all {
        let tag = inbound
            .get("tag")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if exclude.contains(&tag) || fallback_tags.contains(&tag) {
            continue;
        }

        let Some(desc) = resolve_inbound(inbound, &all, fallback_tags)? else {
            continue;
        };

        let expansions = if desc.is_fallback {
            expand_fallbacks(inbound, &desc.fallbacks, &all, fallback_tags)?
        } else {
            Vec::new()
        };

        if seen.insert(desc.tag.clone()) {
            out.push(desc);
        }
        for child in expansions {
            if seen.insert(child.tag.clone()) {
                out.push(child);
            } else {
                debug!("duplicate synthetic inbound '{}' dropped", child.tag);
            }
        }
    }

    Ok(out)
}

/// Materialize one synthetic inbound per fallback parent and resolve it like
/// any other inbound. Collisions are deduplicated upstream by synthetic tag.
fn expand_fallbacks(
    child: &Value,
    parent_tags: &[String],
    all: &[Value],
    fallback_tags: &HashSet<String>,
) -> Result<Vec<InboundDescriptor>, ConfigError> {
    let mut out = Vec::new();
    for parent_tag in parent_tags {
        let Some(parent) = all
            .iter()
            .find(|p| p.get("tag").and_then(Value::as_str) == Some(parent_tag))
        else {
            continue;
        };
        let synth = synthesize_fallback_child(parent, child);
        if let Some(desc) = resolve_inbound(&synth, all, fallback_tags)? {
            out.push(desc);
        }
    }
    Ok(out)
}

/// Strip `//` and `/* */` comments outside of string literals.
pub fn strip_json_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let bytes: Vec<char> = source.chars().collect();
    let mut i = 0;
    let mut in_string = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < bytes.len() {
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
                i += 1;
            }
            '/' if bytes.get(i + 1) == Some(&'/') => {
                while i < bytes.len() && bytes[i] != '\n' {
                    i += 1;
                }
            }
            '/' if bytes.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == '*' && bytes[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(bytes.len());
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}
