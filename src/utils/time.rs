//! Expiry date arithmetic and humanized durations

use chrono::{DateTime, Datelike, Utc};

/// Humanize a remaining duration in seconds.
///
/// Units are months (30 days), days, hours, minutes, seconds. Hours are only
/// shown when fewer than 7 days remain; minutes and seconds only when no
/// whole month or day remains.
pub fn time_left(seconds_left: i64) -> String {
    if seconds_left <= 0 {
        return "0".to_string();
    }

    let (minutes, seconds) = (seconds_left / 60, seconds_left % 60);
    let (hours, minutes) = (minutes / 60, minutes % 60);
    let (days, hours) = (hours / 24, hours % 24);
    let (months, days) = (days / 30, days % 30);

    let mut parts = Vec::new();
    if months > 0 {
        parts.push(format!("{}m", months));
    }
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 && days < 7 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 && months == 0 && days == 0 {
        parts.push(format!("{}min", minutes));
    }
    if seconds > 0 && months == 0 && days == 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

/// Whole days remaining, rounded up. Zero for anything in the past.
pub fn days_left(seconds_left: i64) -> i64 {
    if seconds_left <= 0 {
        0
    } else {
        (seconds_left + 86399) / 86400
    }
}

/// Format a unix timestamp as a `YYYY-MM-DD` Gregorian date.
pub fn format_date(ts: i64) -> String {
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d").to_string(),
        None => "∞".to_string(),
    }
}

/// Format a unix timestamp as a `YYYY-MM-DD` Jalali (Persian calendar) date.
pub fn format_jalali_date(ts: i64) -> String {
    match DateTime::<Utc>::from_timestamp(ts, 0) {
        Some(dt) => {
            let (jy, jm, jd) = gregorian_to_jalali(dt.year(), dt.month() as i32, dt.day() as i32);
            format!("{:04}-{:02}-{:02}", jy, jm, jd)
        }
        None => "∞".to_string(),
    }
}

/// Civil Gregorian to Jalali conversion (arithmetic calendar).
fn gregorian_to_jalali(gy: i32, gm: i32, gd: i32) -> (i32, i32, i32) {
    const G_D_M: [i32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

    let gy2 = if gm > 2 { gy + 1 } else { gy };
    let mut days = 355_666 + 365 * gy + (gy2 + 3) / 4 - (gy2 + 99) / 100
        + (gy2 + 399) / 400
        + gd
        + G_D_M[(gm - 1) as usize];

    let mut jy = -1595 + 33 * (days / 12053);
    days %= 12053;
    jy += 4 * (days / 1461);
    days %= 1461;
    if days > 365 {
        jy += (days - 1) / 365;
        days = (days - 1) % 365;
    }

    let (jm, jd) = if days < 186 {
        (1 + days / 31, 1 + days % 31)
    } else {
        (7 + (days - 186) / 30, 1 + (days - 186) % 30)
    };
    (jy, jm, jd)
}
