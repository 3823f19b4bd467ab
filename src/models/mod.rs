pub mod admin;
pub mod host;
pub mod user;

pub use admin::{Admin, AdminBook};
pub use host::InboundHost;
pub use user::{ProxySettings, User, UserStatus};

use serde::{Deserialize, Serialize};

/// Proxy protocols the inbound resolver understands. Inbounds carrying any
/// other protocol are skipped, not rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "vmess" => Some(Protocol::Vmess),
            "vless" => Some(Protocol::Vless),
            "trojan" => Some(Protocol::Trojan),
            "shadowsocks" => Some(Protocol::Shadowsocks),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
