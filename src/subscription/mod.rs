//! Subscription rendering
//!
//! Merges the user's hosts against one (core, host store) snapshot and emits
//! the result in the requested client format.

pub mod clash;
pub mod links;
pub mod outline;
pub mod share;
pub mod singbox;
pub mod useragent;
pub mod vars;
pub mod xray_json;

use chrono::Utc;
use rand::Rng;

use crate::core::CoreMap;
use crate::error::SubscriptionError;
use crate::models::{InboundHost, User};
use crate::settings::Settings;
use crate::utils::base64::base64_encode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionFormat {
    Links,
    XrayJson,
    SingBox,
    Clash,
    ClashMeta,
    Outline,
}

impl SubscriptionFormat {
    /// Parse a `client_type` path segment or format name.
    pub fn from_name(name: &str) -> Result<Self, SubscriptionError> {
        match name {
            "links" | "v2ray" => Ok(SubscriptionFormat::Links),
            "v2ray-json" | "xray" => Ok(SubscriptionFormat::XrayJson),
            "sing-box" => Ok(SubscriptionFormat::SingBox),
            "clash" => Ok(SubscriptionFormat::Clash),
            "clash-meta" => Ok(SubscriptionFormat::ClashMeta),
            "outline" => Ok(SubscriptionFormat::Outline),
            other => Err(SubscriptionError::UnknownFormat(other.to_string())),
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            SubscriptionFormat::Links => "text/plain",
            SubscriptionFormat::XrayJson
            | SubscriptionFormat::SingBox
            | SubscriptionFormat::Outline => "application/json",
            SubscriptionFormat::Clash | SubscriptionFormat::ClashMeta => "text/yaml",
        }
    }
}

/// Render a user's subscription against the given snapshots.
///
/// Hosts are walked in store order; all random picks flow through `rng` so a
/// seeded generator yields a byte-identical render.
pub fn render(
    user: &User,
    cores: &CoreMap,
    hosts: &[InboundHost],
    format: SubscriptionFormat,
    as_base64: bool,
    reverse: bool,
    rng: &mut impl Rng,
) -> Result<Vec<u8>, SubscriptionError> {
    let vars = vars::format_variables(user, Utc::now().timestamp());
    let filter = Settings::current().filter_hosts_by_user_status;

    let mut processed = share::process_hosts(user, hosts, cores, &vars, filter, rng);
    if reverse {
        processed.reverse();
    }

    let text = match format {
        SubscriptionFormat::Links => links::render(&processed),
        SubscriptionFormat::XrayJson => xray_json::render(&processed)?,
        SubscriptionFormat::SingBox => singbox::render(&processed)?,
        SubscriptionFormat::Clash => clash::render(&processed, false)?,
        SubscriptionFormat::ClashMeta => clash::render(&processed, true)?,
        SubscriptionFormat::Outline => outline::render(&processed)?,
    };

    let payload = if as_base64 {
        base64_encode(&text).into_bytes()
    } else {
        text.into_bytes()
    };
    Ok(payload)
}

/// The `subscription-userinfo` response header value.
pub fn user_info_header(user: &User) -> String {
    format!(
        "upload=0; download={}; total={}; expire={}",
        user.used_traffic,
        user.data_limit.unwrap_or(0),
        user.expire.unwrap_or(0)
    )
}
