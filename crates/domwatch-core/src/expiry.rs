//! Expiry-date extraction from free-form WHOIS/RDAP text.
//!
//! Pure functions only: no I/O, so registrar output can be tested offline.

use std::sync::OnceLock;

use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

/// Canonical on-disk / on-chat date form.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%d";

// Longer phrases first: the regex engine prefers the leftmost alternative, and
// "expires" would otherwise swallow "expires on".
fn keyword_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?i)\b(registry expiry date|registry expiration date",
            r"|registrar registration expiration date|expiration date|expiration time",
            r"|expiry date|expires on|expiration|expiry|expires|paid-till)\b",
            r"[^0-9A-Za-z]*([0-9A-Za-z ,:/\-T\.Z+]+)",
        ))
        .expect("valid regex")
    })
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b\d{4}-\d{2}-\d{2}(?:[ T]\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)?\b",
        )
        .expect("valid regex")
    })
}

const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%d-%b-%Y",
    "%d %b %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%B %d %Y",
];

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];

/// Extract the registration expiry date from WHOIS/RDAP output.
///
/// Tries every keyword-anchored match first, then a bare ISO-8601 date anywhere in the
/// text. `None` means "skip this domain this cycle"; it never defaults to a date.
pub fn extract(text: &str) -> Option<NaiveDate> {
    for caps in keyword_re().captures_iter(text) {
        if let Some(date) = caps.get(2).and_then(|m| parse_token_run(m.as_str())) {
            return Some(date);
        }
    }

    iso_date_re()
        .find_iter(text)
        .find_map(|m| parse_token_run(m.as_str()))
}

/// Same as [`extract`], rendered as `YYYY-MM-DD`.
pub fn extract_canonical(text: &str) -> Option<String> {
    extract(text).map(|d| d.format(CANONICAL_FORMAT).to_string())
}

/// Parse a canonical `YYYY-MM-DD` date (queue entries).
pub fn parse_canonical(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), CANONICAL_FORMAT).ok()
}

/// Whole calendar days from `today` to `expiry`; negative once expired.
///
/// Exactly `1` is the auto-delete trigger.
pub fn days_until(expiry: NaiveDate, today: NaiveDate) -> i64 {
    (expiry - today).num_days()
}

/// A domain is expiring when the time left until its expiry date (00:00 UTC) is within
/// `window`. Already-expired domains count as expiring.
pub fn is_expiring(expiry: NaiveDate, now: DateTime<Utc>, window: Duration) -> bool {
    let expires_at = expiry.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    let Some(expires_at) = expires_at else {
        return false;
    };
    match (expires_at - now).to_std() {
        Ok(left) => left <= window,
        Err(_) => true,
    }
}

/// Parse the text following an expiry keyword. Trailing words that are not part of the
/// date (`UTC`, a registrar name on the same line) are dropped one at a time.
fn parse_token_run(raw: &str) -> Option<NaiveDate> {
    let cleaned = normalize(raw);
    let mut words: Vec<&str> = cleaned.split(' ').filter(|w| !w.is_empty()).collect();

    while !words.is_empty() {
        let candidate = words.join(" ");
        if let Some(date) = parse_with_layouts(&candidate) {
            return Some(date);
        }
        words.pop();
    }
    None
}

fn normalize(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c == ':' || c.is_whitespace());
    trimmed
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(|c: char| c == ':' || c == ',')
        .to_string()
}

fn parse_with_layouts(s: &str) -> Option<NaiveDate> {
    let parsed = DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(s, layout).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
                .map(|dt| dt.date())
        })?;

    // Two-digit years ("01-Mar-25") parse as year 25; treat them as unrecognized.
    (parsed.year() >= 1000).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn registry_expiry_rfc3339() {
        let text = "Registry Expiry Date: 2025-03-01T00:00:00Z";
        assert_eq!(extract_canonical(text).as_deref(), Some("2025-03-01"));
    }

    #[test]
    fn two_digit_year_is_not_found() {
        assert_eq!(extract("Expires on: 01-Mar-25"), None);
    }

    #[test]
    fn no_date_is_not_found() {
        assert_eq!(extract("No match for domain \"EXAMPLE.INVALID\"."), None);
        assert_eq!(extract(""), None);
        assert_eq!(extract("Expiration Date: unknown"), None);
    }

    #[test]
    fn supported_layouts_after_keywords() {
        let cases = [
            ("Expiration Date: 2026/07/04", ymd(2026, 7, 4)),
            ("paid-till: 2026.07.04", ymd(2026, 7, 4)),
            ("Expires on: 04-Jul-2026", ymd(2026, 7, 4)),
            ("Expiry date:  Jul 04, 2026", ymd(2026, 7, 4)),
            ("expires: July 4 2026", ymd(2026, 7, 4)),
            ("Expiration: July 04, 2026", ymd(2026, 7, 4)),
            (
                "Registrar Registration Expiration Date: 2026-07-04T12:30:00.123+08:00",
                ymd(2026, 7, 4),
            ),
            ("Expiration Time: 2026-07-04 08:00:00", ymd(2026, 7, 4)),
            ("Registry Expiration Date: 2026-07-04T08:00:00", ymd(2026, 7, 4)),
        ];
        for (text, want) in cases {
            assert_eq!(extract(text), Some(want), "input: {text}");
        }
    }

    #[test]
    fn trailing_words_are_dropped() {
        let text = "Expiration Date: 04-Jul-2026 04:00:00 UTC";
        assert_eq!(extract(text), Some(ymd(2026, 7, 4)));
    }

    #[test]
    fn falls_back_to_bare_iso_date() {
        let text = "domain: example.org\nstatus: ok\nvalid 2027-01-15 per registry";
        assert_eq!(extract(text), Some(ymd(2027, 1, 15)));
    }

    #[test]
    fn first_parseable_keyword_match_wins() {
        let text = "Expiry: pending review\nRegistry Expiry Date: 2025-12-31T23:59:59Z\n";
        assert_eq!(extract(text), Some(ymd(2025, 12, 31)));
    }

    #[test]
    fn realistic_verisign_block() {
        let text = "   Domain Name: EXAMPLE.COM\n\
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN\n\
   Updated Date: 2024-08-14T07:01:34Z\n\
   Creation Date: 1995-08-14T04:00:00Z\n\
   Registry Expiry Date: 2025-08-13T04:00:00Z\n\
   Registrar: RESERVED-Internet Assigned Numbers Authority\n";
        assert_eq!(extract_canonical(text).as_deref(), Some("2025-08-13"));
    }

    #[test]
    fn rdap_summary_line() {
        let text = "example.net: RDAP Expiration Date: 2026-02-28T05:00:00Z";
        assert_eq!(extract(text), Some(ymd(2026, 2, 28)));
    }

    #[test]
    fn canonical_round_trip() {
        assert_eq!(parse_canonical("2025-03-01"), Some(ymd(2025, 3, 1)));
        assert_eq!(parse_canonical("03/01/2025"), None);
    }

    #[test]
    fn one_calendar_day_ahead_is_one() {
        assert_eq!(days_until(ymd(2025, 3, 2), ymd(2025, 3, 1)), 1);
        assert_eq!(days_until(ymd(2025, 3, 1), ymd(2025, 3, 1)), 0);
        assert_eq!(days_until(ymd(2025, 2, 27), ymd(2025, 3, 1)), -2);
    }

    #[test]
    fn expiring_within_window() {
        let now = ymd(2025, 3, 1).and_hms_opt(12, 0, 0).unwrap().and_utc();
        let week = Duration::from_secs(7 * 24 * 3600);
        assert!(is_expiring(ymd(2025, 3, 8), now, week));
        assert!(!is_expiring(ymd(2025, 3, 9), now, week));
        assert!(is_expiring(ymd(2025, 2, 1), now, week));
        assert!(!is_expiring(ymd(2025, 3, 3), now, Duration::from_secs(24 * 3600)));
    }
}
