//! User profile consumed by the subscription renderer

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::admin::Admin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    Active,
    Expired,
    Limited,
    Disabled,
    OnHold,
}

impl UserStatus {
    /// Fixed emoji mapping used by the `{STATUS_EMOJI}` format variable.
    pub fn emoji(self) -> &'static str {
        match self {
            UserStatus::Active => "✅",
            UserStatus::Expired => "⌛️",
            UserStatus::Limited => "🪫",
            UserStatus::Disabled => "❌",
            UserStatus::OnHold => "🔌",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmessSettings {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VlessSettings {
    pub id: Uuid,
    #[serde(default)]
    pub flow: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrojanSettings {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShadowsocksSettings {
    pub password: String,
    pub method: String,
}

/// Per-protocol credentials of a user. A host whose inbound protocol has no
/// matching entry here is skipped for that user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxySettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vmess: Option<VmessSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vless: Option<VlessSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trojan: Option<TrojanSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadowsocks: Option<ShadowsocksSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub status: UserStatus,
    #[serde(default)]
    pub proxies: ProxySettings,
    /// Inbound tags this user may appear on.
    #[serde(default)]
    pub inbounds: Vec<String>,
    #[serde(default)]
    pub used_traffic: u64,
    /// `None` or zero means unlimited.
    #[serde(default)]
    pub data_limit: Option<u64>,
    /// Absolute unix timestamp; `None` means never.
    #[serde(default)]
    pub expire: Option<i64>,
    /// Window granted once an on-hold user first connects, in seconds.
    #[serde(default)]
    pub on_hold_expire_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Admin>,
}

impl User {
    /// Seconds until expiry relative to `now`. `None` when unlimited.
    ///
    /// On-hold users count from their on-hold window instead of the absolute
    /// expire timestamp.
    pub fn seconds_left(&self, now: i64) -> Option<i64> {
        if self.status == UserStatus::OnHold {
            return self.on_hold_expire_duration;
        }
        self.expire.map(|e| e - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_emoji_mapping() {
        assert_eq!(UserStatus::Active.emoji(), "✅");
        assert_eq!(UserStatus::Expired.emoji(), "⌛️");
        assert_eq!(UserStatus::Limited.emoji(), "🪫");
        assert_eq!(UserStatus::Disabled.emoji(), "❌");
        assert_eq!(UserStatus::OnHold.emoji(), "🔌");
    }

    #[test]
    fn test_on_hold_seconds_left() {
        let user = User {
            username: "u".into(),
            status: UserStatus::OnHold,
            proxies: ProxySettings::default(),
            inbounds: vec![],
            used_traffic: 0,
            data_limit: None,
            expire: Some(0),
            on_hold_expire_duration: Some(3600),
            admin: None,
        };
        assert_eq!(user.seconds_left(1_700_000_000), Some(3600));
    }
}
