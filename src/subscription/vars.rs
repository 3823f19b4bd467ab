//! Format-variable dictionary
//!
//! The variables substituted into host remark and path templates. Unknown
//! keys render as `<missing>` through the template formatter, never error.

use std::collections::HashMap;

use crate::models::{User, UserStatus};
use crate::settings::Settings;
use crate::utils::size::{readable_limit, readable_size};
use crate::utils::time::{days_left, format_date, format_jalali_date, time_left};

/// Build the per-user variable dictionary. `PROTOCOL` and `TRANSPORT` are
/// filled in per host by the pipeline.
pub fn format_variables(user: &User, now: i64) -> HashMap<String, String> {
    let settings = Settings::current();
    let seconds_left = user.seconds_left(now);

    let mut vars = HashMap::new();
    vars.insert("SERVER_IP".to_string(), settings.server_ip.clone());
    vars.insert("SERVER_IPV6".to_string(), settings.server_ipv6.clone());
    vars.insert("USERNAME".to_string(), user.username.clone());
    vars.insert(
        "DATA_USAGE".to_string(),
        readable_size(user.used_traffic),
    );
    vars.insert("DATA_LIMIT".to_string(), readable_limit(user.data_limit));
    vars.insert(
        "DATA_LEFT".to_string(),
        match user.data_limit {
            Some(limit) if limit > 0 => readable_size(limit.saturating_sub(user.used_traffic)),
            _ => "∞".to_string(),
        },
    );
    vars.insert(
        "DAYS_LEFT".to_string(),
        match seconds_left {
            Some(secs) => days_left(secs).to_string(),
            None => "∞".to_string(),
        },
    );
    vars.insert(
        "TIME_LEFT".to_string(),
        match seconds_left {
            Some(secs) => time_left(secs),
            None => "∞".to_string(),
        },
    );
    let (expire_date, jalali) = match (user.status, user.expire) {
        (UserStatus::OnHold, _) | (_, None) => ("∞".to_string(), "∞".to_string()),
        (_, Some(ts)) => (format_date(ts), format_jalali_date(ts)),
    };
    vars.insert("EXPIRE_DATE".to_string(), expire_date);
    vars.insert("JALALI_EXPIRE_DATE".to_string(), jalali);
    vars.insert(
        "STATUS_EMOJI".to_string(),
        user.status.emoji().to_string(),
    );
    vars.insert(
        "USAGE_PERCENTAGE".to_string(),
        match user.data_limit {
            Some(limit) if limit > 0 => {
                let pct = user.used_traffic as f64 / limit as f64 * 100.0;
                let text = format!("{:.2}", pct);
                text.trim_end_matches('0').trim_end_matches('.').to_string()
            }
            _ => "∞".to_string(),
        },
    );
    vars.insert(
        "ADMIN_USERNAME".to_string(),
        user.admin
            .as_ref()
            .map(|a| a.username.clone())
            .unwrap_or_default(),
    );
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProxySettings;

    fn user() -> User {
        User {
            username: "alice".into(),
            status: UserStatus::Active,
            proxies: ProxySettings::default(),
            inbounds: vec![],
            used_traffic: 512 * 1024 * 1024,
            data_limit: Some(1024 * 1024 * 1024),
            expire: Some(1_700_000_000 + 3 * 86400),
            on_hold_expire_duration: None,
            admin: None,
        }
    }

    #[test]
    fn test_basic_variables() {
        let vars = format_variables(&user(), 1_700_000_000);
        assert_eq!(vars["USERNAME"], "alice");
        assert_eq!(vars["DATA_USAGE"], "512 MB");
        assert_eq!(vars["DATA_LIMIT"], "1 GB");
        assert_eq!(vars["DATA_LEFT"], "512 MB");
        assert_eq!(vars["DAYS_LEFT"], "3");
        assert_eq!(vars["STATUS_EMOJI"], "✅");
        assert_eq!(vars["USAGE_PERCENTAGE"], "50");
    }

    #[test]
    fn test_unlimited_user() {
        let mut u = user();
        u.data_limit = None;
        u.expire = None;
        let vars = format_variables(&u, 1_700_000_000);
        assert_eq!(vars["DATA_LIMIT"], "∞");
        assert_eq!(vars["DATA_LEFT"], "∞");
        assert_eq!(vars["DAYS_LEFT"], "∞");
        assert_eq!(vars["TIME_LEFT"], "∞");
        assert_eq!(vars["EXPIRE_DATE"], "∞");
        assert_eq!(vars["USAGE_PERCENTAGE"], "∞");
    }

    #[test]
    fn test_expired_user_zeroes() {
        let mut u = user();
        u.expire = Some(1_600_000_000);
        let vars = format_variables(&u, 1_700_000_000);
        assert_eq!(vars["DAYS_LEFT"], "0");
        assert_eq!(vars["TIME_LEFT"], "0");
    }

    #[test]
    fn test_on_hold_uses_duration() {
        let mut u = user();
        u.status = UserStatus::OnHold;
        u.expire = Some(0);
        u.on_hold_expire_duration = Some(5 * 86400);
        let vars = format_variables(&u, 1_700_000_000);
        assert_eq!(vars["DAYS_LEFT"], "5");
        assert_eq!(vars["TIME_LEFT"], "5d");
        assert_eq!(vars["STATUS_EMOJI"], "🔌");
        assert_eq!(vars["EXPIRE_DATE"], "∞");
    }
}
