use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use uuid::Uuid;

use subray::core::CoreRegistry;
use subray::models::user::{ShadowsocksSettings, VlessSettings};
use subray::models::{InboundHost, ProxySettings, User, UserStatus};
use subray::subscription::{self, SubscriptionFormat};
use subray::utils::base64::{base64_decode, url_safe_base64_encode_bytes};

// Test vector from RFC 7748 section 6.1
const X25519_PRIVATE: [u8; 32] = [
    0x77, 0x07, 0x6d, 0x0a, 0x73, 0x18, 0xa5, 0x7d, 0x3c, 0x16, 0xc1, 0x72, 0x51, 0xb2, 0x66,
    0x45, 0xdf, 0x4c, 0x2f, 0x87, 0xeb, 0xc0, 0x99, 0x2a, 0xb1, 0x77, 0xfb, 0xa5, 0x1d, 0xb9,
    0x2c, 0x2a,
];
const X25519_PUBLIC_B64: &str = "hSDwCYkwp1R0i33ctD73Wg2_Og0mOBr066SpjqqbTmo";

fn registry() -> CoreRegistry {
    let registry = CoreRegistry::new();
    registry
        .update(
            "main",
            json!({
                "inbounds": [
                    {
                        "tag": "vless-tcp", "protocol": "vless", "port": 443,
                        "streamSettings": {
                            "network": "tcp", "security": "reality",
                            "realitySettings": {
                                "privateKey": url_safe_base64_encode_bytes(&X25519_PRIVATE),
                                "serverNames": ["example.com"],
                                "shortIds": ["ab"]
                            }
                        }
                    },
                    {
                        "tag": "ss-in", "protocol": "shadowsocks", "port": 8388,
                        "settings": {"method": "aes-128-gcm"}
                    }
                ],
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
                flow: "xtls-rprx-vision".into(),
            }),
            shadowsocks: Some(ShadowsocksSettings {
                password: "secret".into(),
                method: "aes-128-gcm".into(),
            }),
            ..Default::default()
        },
        inbounds: vec!["vless-tcp".into(), "ss-in".into()],
        used_traffic: 0,
        data_limit: None,
        expire: None,
        on_hold_expire_duration: None,
        admin: None,
    }
}

fn vless_host() -> InboundHost {
    let mut host = InboundHost::for_tag("vless-tcp");
    host.remark = "remark".into();
    host.address = vec!["proxy.example.com".into()];
    host
}

fn ss_host() -> InboundHost {
    let mut host = InboundHost::for_tag("ss-in");
    host.remark = "fast ss".into();
    host.address = vec!["ss.example.com".into()];
    host
}

fn render(
    hosts: &[InboundHost],
    format: SubscriptionFormat,
    as_base64: bool,
    reverse: bool,
    seed: u64,
) -> Vec<u8> {
    let registry = registry();
    let snap = registry.snapshot();
    let mut rng = StdRng::seed_from_u64(seed);
    subscription::render(&user(), &snap, hosts, format, as_base64, reverse, &mut rng).unwrap()
}

#[test]
fn test_vless_reality_link_with_derived_public_key() {
    let payload = render(&[vless_host()], SubscriptionFormat::Links, false, false, 1);
    let text = String::from_utf8(payload).unwrap();
    assert_eq!(
        text,
        format!(
            "vless://00000000-0000-0000-0000-000000000000@proxy.example.com:443\
             ?type=tcp&security=reality&pbk={}&sid=ab&sni=example.com\
             &fp=chrome&flow=xtls-rprx-vision#remark",
            X25519_PUBLIC_B64
        )
    );
}

#[test]
fn test_seeded_render_is_byte_identical() {
    let mut host = vless_host();
    host.address = vec!["*.example.com".into(), "static.example.com".into()];
    host.sni = vec!["a.example.com".into(), "b.example.com".into()];

    let first = render(
        &[host.clone()],
        SubscriptionFormat::Links,
        false,
        false,
        42,
    );
    let second = render(&[host], SubscriptionFormat::Links, false, false, 42);
    assert_eq!(first, second);
    assert!(!String::from_utf8(first).unwrap().contains('*'));
}

#[test]
fn test_base64_framing_decodes_to_plain_render() {
    let hosts = [vless_host(), ss_host()];
    let plain = render(&hosts, SubscriptionFormat::Links, false, false, 9);
    let framed = render(&hosts, SubscriptionFormat::Links, true, false, 9);

    let framed = String::from_utf8(framed).unwrap();
    assert_eq!(
        base64_decode(&framed, false),
        String::from_utf8(plain).unwrap()
    );
}

#[test]
fn test_reverse_flips_host_order() {
    let hosts = [vless_host(), ss_host()];
    let forward = String::from_utf8(render(&hosts, SubscriptionFormat::Links, false, false, 3))
        .unwrap();
    let reversed = String::from_utf8(render(&hosts, SubscriptionFormat::Links, false, true, 3))
        .unwrap();

    let forward: Vec<&str> = forward.lines().collect();
    let mut expected: Vec<&str> = reversed.lines().collect();
    expected.reverse();
    assert_eq!(forward.len(), 2);
    assert_eq!(forward, expected);
}

#[test]
fn test_xray_json_configs_parse_back() {
    let payload = render(&[vless_host()], SubscriptionFormat::XrayJson, false, false, 5);
    let configs: Vec<Value> = serde_json::from_slice(&payload).unwrap();
    assert_eq!(configs.len(), 1);
    assert_eq!(configs[0]["remarks"], "remark");

    let stream = &configs[0]["outbounds"][0]["streamSettings"];
    assert_eq!(stream["security"], "reality");
    assert_eq!(stream["realitySettings"]["publicKey"], X25519_PUBLIC_B64);
    assert_eq!(stream["realitySettings"]["shortId"], "ab");
}

#[test]
fn test_singbox_outbounds_parse_back() {
    let payload = render(&[vless_host()], SubscriptionFormat::SingBox, false, false, 5);
    let parsed: Value = serde_json::from_slice(&payload).unwrap();
    let outbounds = parsed["outbounds"].as_array().unwrap();
    // selector + endpoint + direct
    assert_eq!(outbounds.len(), 3);
    assert_eq!(outbounds[1]["tls"]["reality"]["public_key"], X25519_PUBLIC_B64);
}

#[test]
fn test_outline_keeps_only_shadowsocks() {
    let payload = render(
        &[vless_host(), ss_host()],
        SubscriptionFormat::Outline,
        false,
        false,
        5,
    );
    let parsed: Value = serde_json::from_slice(&payload).unwrap();
    let servers = parsed["servers"].as_array().unwrap();
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["server"], "ss.example.com");
    assert_eq!(servers[0]["method"], "aes-128-gcm");
}

#[test]
fn test_clash_meta_carries_reality() {
    let payload = render(
        &[vless_host()],
        SubscriptionFormat::ClashMeta,
        false,
        false,
        5,
    );
    let parsed: Value = serde_yaml::from_slice(&payload).unwrap();
    let proxy = &parsed["proxies"][0];
    assert_eq!(proxy["type"], "vless");
    assert_eq!(proxy["reality-opts"]["public-key"], X25519_PUBLIC_B64);
}

#[test]
fn test_classic_clash_drops_reality_vless() {
    let payload = render(&[vless_host()], SubscriptionFormat::Clash, false, false, 5);
    let parsed: serde_yaml::Value = serde_yaml::from_slice(&payload).unwrap();
    assert!(parsed["proxies"].as_sequence().unwrap().is_empty());
}

#[test]
fn test_user_without_credential_renders_nothing() {
    let registry = registry();
    let snap = registry.snapshot();
    let mut u = user();
    u.proxies.vless = None;
    let mut rng = StdRng::seed_from_u64(1);
    let payload = subscription::render(
        &u,
        &snap,
        &[vless_host()],
        SubscriptionFormat::Links,
        false,
        false,
        &mut rng,
    )
    .unwrap();
    assert!(payload.is_empty());
}

#[test]
fn test_host_with_unknown_tag_is_skipped() {
    let registry = registry();
    let snap = registry.snapshot();
    let mut u = user();
    u.inbounds.push("ghost".into());
    let mut ghost = InboundHost::for_tag("ghost");
    ghost.address = vec!["x.example.com".into()];

    let mut rng = StdRng::seed_from_u64(1);
    let payload = subscription::render(
        &u,
        &snap,
        &[ghost, vless_host()],
        SubscriptionFormat::Links,
        false,
        false,
        &mut rng,
    )
    .unwrap();
    let text = String::from_utf8(payload).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("vless://"));
}
