//! Host override records
//!
//! A host customizes how one inbound is advertised to users. It layers on
//! top of an inbound descriptor; it never owns the inbound.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::user::UserStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundHost {
    /// Display name template, formatted through the variable dictionary.
    #[serde(default)]
    pub remark: String,
    /// Tag of the inbound this host advertises. Unknown tags make the host
    /// invisible, they do not fail the subscription.
    pub inbound_tag: String,
    /// Candidate addresses; one is selected per render. `*` entries are
    /// replaced with a fresh salt.
    #[serde(default)]
    pub address: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default)]
    pub sni: Vec<String>,
    #[serde(default)]
    pub host: Vec<String>,
    /// Path template, formatted through the variable dictionary. Falls back
    /// to the descriptor path when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub allowinsecure: bool,
    /// TLS override; beats the descriptor value when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,
    #[serde(default)]
    pub use_sni_as_host: bool,
    /// Statuses this host is visible to. Empty means any.
    #[serde(default)]
    pub status: Vec<UserStatus>,
    /// Per-transport overrides keyed by network keyword; a `type` key inside
    /// renames to the descriptor's `header_type`.
    #[serde(default)]
    pub transport_settings: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment_settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise_settings: Option<Value>,
    #[serde(default)]
    pub random_user_agent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux_settings: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ech_config_list: Option<String>,
    /// Nested overlay for split download transport.
    #[serde(
        default,
        rename = "downloadSettings",
        skip_serializing_if = "Option::is_none"
    )]
    pub download_settings: Option<Box<InboundHost>>,
}

impl InboundHost {
    /// Minimal host advertising one inbound tag with no overrides.
    pub fn for_tag(tag: impl Into<String>) -> Self {
        InboundHost {
            remark: String::new(),
            inbound_tag: tag.into(),
            address: Vec::new(),
            port: None,
            sni: Vec::new(),
            host: Vec::new(),
            path: None,
            alpn: None,
            fingerprint: None,
            allowinsecure: false,
            security: None,
            use_sni_as_host: false,
            status: Vec::new(),
            transport_settings: HashMap::new(),
            fragment_settings: None,
            noise_settings: None,
            random_user_agent: false,
            http_headers: None,
            mux_settings: None,
            ech_config_list: None,
            download_settings: None,
        }
    }

    /// Whether this host is visible to a user in the given status. An empty
    /// status set admits everyone.
    pub fn admits(&self, status: UserStatus) -> bool {
        self.status.is_empty() || self.status.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_status_set_admits_all() {
        let host = InboundHost::for_tag("vless-in");
        assert!(host.admits(UserStatus::Active));
        assert!(host.admits(UserStatus::Limited));
    }

    #[test]
    fn test_status_set_intersection() {
        let mut host = InboundHost::for_tag("vless-in");
        host.status = vec![UserStatus::Active];
        assert!(host.admits(UserStatus::Active));
        assert!(!host.admits(UserStatus::Limited));
    }
}
