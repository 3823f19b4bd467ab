//! Client User-Agent dispatch
//!
//! Maps a User-Agent string to the format, media type and framing the client
//! expects. Unknown clients fall back to base64 raw links.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::settings::Settings;
use crate::subscription::SubscriptionFormat;

/// What the dispatcher decided for a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientHint {
    pub format: SubscriptionFormat,
    pub media_type: &'static str,
    pub as_base64: bool,
    pub reverse: bool,
}

impl ClientHint {
    fn plain(format: SubscriptionFormat) -> Self {
        ClientHint {
            format,
            media_type: format.media_type(),
            as_base64: false,
            reverse: false,
        }
    }

    fn links_fallback() -> Self {
        ClientHint {
            format: SubscriptionFormat::Links,
            media_type: "text/plain",
            as_base64: true,
            reverse: false,
        }
    }
}

/// Global opt-in flags gating the v2ray-json dispatch targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOptIns {
    pub v2rayn: bool,
    pub v2rayng: bool,
    pub streisand: bool,
    pub happ: bool,
    pub ktor: bool,
}

impl JsonOptIns {
    pub fn from_settings() -> Self {
        let s = Settings::current();
        JsonOptIns {
            v2rayn: s.use_json_for_v2rayn,
            v2rayng: s.use_json_for_v2rayng,
            streisand: s.use_json_for_streisand,
            happ: s.use_json_for_happ,
            ktor: s.use_json_for_ktor,
        }
    }
}

static RE_CLASH_META: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Clash[-.]?Verge|Clash[-.]?Meta|FLClash|Mihomo)").unwrap());
static RE_CLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(Clash|Stash)").unwrap());
static RE_SINGBOX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(SFA|SFI|SFM|SFT|Karing|HiddifyNext)").unwrap());
static RE_OUTLINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(SS|SSR|SSD|SSS|Outline|Shadowsocks|SSconf)").unwrap());
static RE_V2RAYN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^v2rayN/(\d+\.\d+)").unwrap());
static RE_V2RAYNG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^v2rayNG/(\d+\.\d+\.\d+)").unwrap());
static RE_STREISAND: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Streisand").unwrap());
static RE_HAPP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Happ/(\d+\.\d+\.\d+)").unwrap());

/// Compare dotted numeric versions segment by segment; missing segments
/// count as zero.
pub fn ver_greater_equal(version: &str, reference: &str) -> bool {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|seg| seg.chars().take_while(|c| c.is_ascii_digit()).collect::<String>())
            .map(|seg| seg.parse().unwrap_or(0))
            .collect()
    };
    let a = parse(version);
    let b = parse(reference);
    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    true
}

/// Classify a User-Agent string, in priority order.
pub fn match_user_agent(user_agent: &str, opt_ins: &JsonOptIns) -> ClientHint {
    if RE_CLASH_META.is_match(user_agent) {
        return ClientHint::plain(SubscriptionFormat::ClashMeta);
    }
    if RE_CLASH.is_match(user_agent) {
        return ClientHint::plain(SubscriptionFormat::Clash);
    }
    if RE_SINGBOX.is_match(user_agent) || user_agent.to_lowercase().contains("sing-box") {
        return ClientHint::plain(SubscriptionFormat::SingBox);
    }
    if RE_OUTLINE.is_match(user_agent) {
        return ClientHint::plain(SubscriptionFormat::Outline);
    }
    if let Some(caps) = RE_V2RAYN.captures(user_agent) {
        if opt_ins.v2rayn && ver_greater_equal(&caps[1], "6.40") {
            return ClientHint::plain(SubscriptionFormat::XrayJson);
        }
        return ClientHint::links_fallback();
    }
    if let Some(caps) = RE_V2RAYNG.captures(user_agent) {
        if opt_ins.v2rayng {
            let version = &caps[1];
            if ver_greater_equal(version, "1.8.29") {
                return ClientHint::plain(SubscriptionFormat::XrayJson);
            }
            if ver_greater_equal(version, "1.8.18") {
                // Older builds show the list bottom-up
                return ClientHint {
                    reverse: true,
                    ..ClientHint::plain(SubscriptionFormat::XrayJson)
                };
            }
        }
        return ClientHint::links_fallback();
    }
    if RE_STREISAND.is_match(user_agent) {
        if opt_ins.streisand {
            return ClientHint::plain(SubscriptionFormat::XrayJson);
        }
        return ClientHint::links_fallback();
    }
    if let Some(caps) = RE_HAPP.captures(user_agent) {
        if opt_ins.happ && ver_greater_equal(&caps[1], "1.11.0") {
            return ClientHint::plain(SubscriptionFormat::XrayJson);
        }
        return ClientHint::links_fallback();
    }
    if opt_ins.ktor && user_agent.contains("ktor-client") {
        return ClientHint::plain(SubscriptionFormat::XrayJson);
    }

    ClientHint::links_fallback()
}
