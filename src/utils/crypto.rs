//! Certificate and Reality key helpers

use base64::{engine::general_purpose, Engine as _};
use x509_parser::extensions::GeneralName;
use x509_parser::pem::Pem;

use crate::error::ConfigError;
use crate::utils::base64::url_safe_base64_encode_bytes;

/// Extract subject alternative names from a PEM certificate chain.
///
/// DNS names and IP addresses are collected in certificate order; entries the
/// parser cannot represent are skipped.
pub fn get_cert_sans(pem: &str) -> Vec<String> {
    let mut sans = Vec::new();

    for parsed in Pem::iter_from_buffer(pem.as_bytes()) {
        let pem = match parsed {
            Ok(p) => p,
            Err(_) => continue,
        };
        let cert = match pem.parse_x509() {
            Ok(c) => c,
            Err(_) => continue,
        };
        if let Ok(Some(ext)) = cert.subject_alternative_name() {
            for name in &ext.value.general_names {
                match name {
                    GeneralName::DNSName(dns) => sans.push(dns.to_string()),
                    GeneralName::IPAddress(ip) => match ip.len() {
                        4 => sans.push(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])),
                        16 => {
                            let mut segs = [0u16; 8];
                            for (i, seg) in segs.iter_mut().enumerate() {
                                *seg = u16::from_be_bytes([ip[2 * i], ip[2 * i + 1]]);
                            }
                            sans.push(std::net::Ipv6Addr::from(segs).to_string());
                        }
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    }

    sans
}

/// Derive the Reality public key from a base64 private key.
///
/// Xray writes keys as URL-safe base64 without padding but standard base64
/// appears in the wild too; both are accepted. The output always uses the
/// URL-safe no-padding form Xray expects on the wire.
pub fn reality_public_key(private_key_b64: &str) -> Result<String, ConfigError> {
    let raw = decode_key(private_key_b64).ok_or_else(|| {
        ConfigError::Invalid(format!(
            "Reality private key is not valid base64: {}",
            private_key_b64
        ))
    })?;

    let bytes: [u8; 32] = raw.try_into().map_err(|_| {
        ConfigError::Invalid("Reality private key must decode to 32 bytes".to_string())
    })?;

    let secret = x25519_dalek::StaticSecret::from(bytes);
    let public = x25519_dalek::PublicKey::from(&secret);
    Ok(url_safe_base64_encode_bytes(public.as_bytes()))
}

fn decode_key(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim().trim_end_matches('=');
    general_purpose::URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(trimmed))
        .ok()
}
