//! `format` assertions for the formats the engine knows.
//!
//! Unknown formats always pass so documents using vendor formats
//! (`int64`, `binary`, `password`, ...) keep validating.

#![allow(clippy::expect_used)]

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};

static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("format regex should be valid"));

static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}):(\d{2}):(\d{2})(\.\d+)?([zZ]|[+-]\d{2}:\d{2})$")
        .expect("format regex should be valid")
});

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$")
        .expect("format regex should be valid")
});

static HOSTNAME_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("format regex should be valid")
});

static UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("format regex should be valid")
});

/// `Some(valid)` for a known format, `None` for an unknown one.
#[must_use]
pub fn check(format: &str, value: &str) -> Option<bool> {
    Some(match format {
        "date" => is_date(value),
        "date-time" => is_date_time(value),
        "time" => is_time(value),
        "email" => EMAIL.is_match(value),
        "hostname" => is_hostname(value),
        "ipv4" => value.parse::<Ipv4Addr>().is_ok(),
        "ipv6" => value.parse::<Ipv6Addr>().is_ok(),
        "uri" => url::Url::parse(value).is_ok(),
        "uuid" => UUID.is_match(value),
        "regex" => Regex::new(value).is_ok(),
        _ => return None,
    })
}

fn is_date(value: &str) -> bool {
    let Some(caps) = DATE.captures(value) else {
        return false;
    };
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let (Some(year), Some(month), Some(day)) = (field(1), field(2), field(3)) else {
        return false;
    };
    let days = match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) => 29,
        2 => 28,
        _ => return false,
    };
    (1..=days).contains(&day)
}

fn is_time(value: &str) -> bool {
    let Some(caps) = TIME.captures(value) else {
        return false;
    };
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    // 60 allows leap seconds
    matches!((field(1), field(2), field(3)), (Some(h), Some(m), Some(s)) if h < 24 && m < 60 && s <= 60)
}

fn is_date_time(value: &str) -> bool {
    match value.find(['T', 't', ' ']) {
        Some(idx) => is_date(&value[..idx]) && is_time(&value[idx + 1..]),
        None => false,
    }
}

fn is_hostname(value: &str) -> bool {
    let value = value.strip_suffix('.').unwrap_or(value);
    !value.is_empty()
        && value.len() <= 253
        && value.split('.').all(|label| HOSTNAME_LABEL.is_match(label))
}
