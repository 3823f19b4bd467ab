use base64::{engine::general_purpose, Engine as _};

/// Encodes a string to Base64 format.
pub fn base64_encode(input: &str) -> String {
    general_purpose::STANDARD.encode(input)
}

/// Decodes a Base64 string to its original form.
///
/// # Arguments
/// * `input` - The Base64 encoded string.
/// * `accept_urlsafe` - A boolean indicating whether to accept URL-safe Base64 encoding.
///
/// # Returns
/// The decoded string, or an empty string if the input is invalid.
pub fn base64_decode(input: &str, accept_urlsafe: bool) -> String {
    let engine = if accept_urlsafe {
        general_purpose::URL_SAFE
    } else {
        general_purpose::STANDARD
    };

    match engine.decode(input) {
        Ok(decoded) => String::from_utf8_lossy(&decoded).to_string(),
        Err(_) => String::new(), // Handle invalid Base64 input
    }
}

/// Encodes bytes to URL-safe Base64 without padding, the convention Xray uses
/// for Reality public keys.
pub fn url_safe_base64_encode_bytes(input: &[u8]) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(input)
}

/// Encodes a string to URL-safe Base64 without padding.
pub fn url_safe_base64_encode(input: &str) -> String {
    general_purpose::URL_SAFE_NO_PAD.encode(input)
}

/// Checks that the input is decodable standard Base64. Used to validate
/// Shadowsocks 2022 pre-shared keys.
pub fn is_valid_base64(input: &str) -> bool {
    general_purpose::STANDARD.decode(input).is_ok()
}

/// Encodes a profile title into the `base64:` framed form carried by the
/// `profile-title` response header.
pub fn encode_title(title: &str) -> String {
    format!("base64:{}", base64_encode(title))
}

/// Decodes a `base64:`-framed profile title. A title without the frame is
/// returned as-is.
pub fn decode_title(title: &str) -> String {
    match title.strip_prefix("base64:") {
        Some(encoded) => base64_decode(encoded, false),
        None => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_round_trip() {
        for title in ["Subscription", "پروفایل", "a b c", ""] {
            assert_eq!(decode_title(&encode_title(title)), title);
        }
    }

    #[test]
    fn test_title_frame() {
        assert_eq!(encode_title("abc"), "base64:YWJj");
        assert_eq!(decode_title("plain title"), "plain title");
    }

    #[test]
    fn test_is_valid_base64() {
        assert!(is_valid_base64("YWJjZGVmZ2hpamtsbW5vcA=="));
        assert!(!is_valid_base64("not-base64!"));
    }

    #[test]
    fn test_url_safe_no_padding() {
        assert_eq!(url_safe_base64_encode_bytes(&[0xfb, 0xff]), "-_8");
    }
}
