//! Human readable data sizes

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Render a byte count with base-1024 units, `B` through `YB`.
///
/// Values above 1024 of a unit promote to the next one; fractional parts are
/// kept to two digits and trimmed.
pub fn readable_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0usize;

    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        let text = format!("{:.2}", value);
        let text = text.trim_end_matches('0').trim_end_matches('.');
        format!("{} {}", text, UNITS[unit])
    }
}

/// Render an optional limit, where `None` or `0` means unlimited.
pub fn readable_limit(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) if b > 0 => readable_size(b),
        _ => "∞".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readable_size_units() {
        assert_eq!(readable_size(0), "0 B");
        assert_eq!(readable_size(512), "512 B");
        assert_eq!(readable_size(1024), "1 KB");
        assert_eq!(readable_size(1536), "1.5 KB");
        assert_eq!(readable_size(1024 * 1024), "1 MB");
        assert_eq!(readable_size(10 * 1024 * 1024 * 1024), "10 GB");
    }

    #[test]
    fn test_readable_size_monotonic() {
        // Same-unit renderings must not decrease as bytes grow
        let sizes: Vec<u64> = (0..30).map(|i| 1u64 << i).collect();
        for pair in sizes.windows(2) {
            let a = readable_size(pair[0]);
            let b = readable_size(pair[1]);
            assert_ne!(a, b, "{} vs {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_readable_limit_unlimited() {
        assert_eq!(readable_limit(None), "∞");
        assert_eq!(readable_limit(Some(0)), "∞");
        assert_eq!(readable_limit(Some(2048)), "2 KB");
    }
}
