use subray::subscription::useragent::{match_user_agent, ver_greater_equal, JsonOptIns};
use subray::subscription::SubscriptionFormat;

fn all_opt_ins() -> JsonOptIns {
    JsonOptIns {
        v2rayn: true,
        v2rayng: true,
        streisand: true,
        happ: true,
        ktor: true,
    }
}

#[test]
fn test_ver_greater_equal() {
    assert!(ver_greater_equal("1.2.3", "1.2.3"));
    assert!(ver_greater_equal("1.2.4", "1.2.3"));
    assert!(ver_greater_equal("1.3.0", "1.2.3"));
    assert!(ver_greater_equal("2.0.0", "1.2.3"));
    assert!(ver_greater_equal("1.2.3.4", "1.2.3"));
    assert!(!ver_greater_equal("1.2.2", "1.2.3"));
    assert!(!ver_greater_equal("1.1.9", "1.2.3"));
    assert!(!ver_greater_equal("0.9.9", "1.2.3"));
}

#[test]
fn test_clash_family() {
    let opt_ins = JsonOptIns::default();
    assert_eq!(
        match_user_agent("Clash-Verge/1.5.0", &opt_ins).format,
        SubscriptionFormat::ClashMeta
    );
    assert_eq!(
        match_user_agent("ClashMeta/1.16.0", &opt_ins).format,
        SubscriptionFormat::ClashMeta
    );
    assert_eq!(
        match_user_agent("Mihomo/1.18.0", &opt_ins).format,
        SubscriptionFormat::ClashMeta
    );
    assert_eq!(
        match_user_agent("Clash/2023.08.17", &opt_ins).format,
        SubscriptionFormat::Clash
    );
    assert_eq!(
        match_user_agent("Stash/2.5.0", &opt_ins).format,
        SubscriptionFormat::Clash
    );
}

#[test]
fn test_singbox_family() {
    let opt_ins = JsonOptIns::default();
    assert_eq!(
        match_user_agent("SFA/1.8.0", &opt_ins).format,
        SubscriptionFormat::SingBox
    );
    assert_eq!(
        match_user_agent("curl sing-box/1.8.0", &opt_ins).format,
        SubscriptionFormat::SingBox
    );
}

#[test]
fn test_outline_family() {
    let hint = match_user_agent("Outline/1.0", &JsonOptIns::default());
    assert_eq!(hint.format, SubscriptionFormat::Outline);
    assert!(!hint.as_base64);
}

#[test]
fn test_v2rayn_version_gate() {
    let opt_ins = all_opt_ins();
    let hint = match_user_agent("v2rayN/6.40", &opt_ins);
    assert_eq!(hint.format, SubscriptionFormat::XrayJson);
    assert!(!hint.reverse);

    // Below the JSON-capable version: base64 links
    let hint = match_user_agent("v2rayN/6.39", &opt_ins);
    assert_eq!(hint.format, SubscriptionFormat::Links);
    assert!(hint.as_base64);

    // Without the opt-in even new versions get links
    let hint = match_user_agent("v2rayN/6.45", &JsonOptIns::default());
    assert_eq!(hint.format, SubscriptionFormat::Links);
}

#[test]
fn test_v2rayng_reverse_window() {
    let opt_ins = all_opt_ins();

    // >= 1.8.29 renders top-down
    let hint = match_user_agent("v2rayNG/1.9.0", &opt_ins);
    assert_eq!(hint.format, SubscriptionFormat::XrayJson);
    assert!(!hint.reverse);

    // 1.8.18 ..= 1.8.28 renders bottom-up, so the list is reversed
    let hint = match_user_agent("v2rayNG/1.8.20", &opt_ins);
    assert_eq!(hint.format, SubscriptionFormat::XrayJson);
    assert!(hint.reverse);

    // older than 1.8.18 cannot import the JSON form at all
    let hint = match_user_agent("v2rayNG/1.8.10", &opt_ins);
    assert_eq!(hint.format, SubscriptionFormat::Links);
    assert!(hint.as_base64);

    let hint = match_user_agent("v2rayNG/1.8.20", &JsonOptIns::default());
    assert_eq!(hint.format, SubscriptionFormat::Links);
}

#[test]
fn test_streisand_opt_in() {
    let hint = match_user_agent("Streisand/1.5.9", &all_opt_ins());
    assert_eq!(hint.format, SubscriptionFormat::XrayJson);

    let hint = match_user_agent("Streisand/1.5.9", &JsonOptIns::default());
    assert_eq!(hint.format, SubscriptionFormat::Links);
}

#[test]
fn test_happ_version_gate() {
    let opt_ins = all_opt_ins();
    assert_eq!(
        match_user_agent("Happ/1.11.0", &opt_ins).format,
        SubscriptionFormat::XrayJson
    );
    assert_eq!(
        match_user_agent("Happ/1.10.9", &opt_ins).format,
        SubscriptionFormat::Links
    );
}

#[test]
fn test_ktor_contains_match() {
    let hint = match_user_agent("ktor-client/2.3.5 (Android)", &all_opt_ins());
    assert_eq!(hint.format, SubscriptionFormat::XrayJson);

    let hint = match_user_agent("ktor-client/2.3.5 (Android)", &JsonOptIns::default());
    assert_eq!(hint.format, SubscriptionFormat::Links);
}

#[test]
fn test_unknown_agent_falls_back_to_base64_links() {
    let hint = match_user_agent("Mozilla/5.0 (X11; Linux x86_64)", &JsonOptIns::default());
    assert_eq!(hint.format, SubscriptionFormat::Links);
    assert_eq!(hint.media_type, "text/plain");
    assert!(hint.as_base64);
    assert!(!hint.reverse);
}
