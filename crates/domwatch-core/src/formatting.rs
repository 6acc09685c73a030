//! Chat message rendering (Telegram HTML).

use chrono::NaiveDate;

use crate::{
    expiry::CANONICAL_FORMAT,
    ports::{DnsRecord, ZoneDetail},
};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn code(text: &str) -> String {
    format!("<code>{}</code>", escape_html(text))
}

fn on_off(flag: bool) -> &'static str {
    if flag {
        "on"
    } else {
        "off"
    }
}

/// One line per record: `TYPE NAME → CONTENT (proxied: on/off)`.
pub fn format_record_line(record: &DnsRecord) -> String {
    format!(
        "{} {} → {} (proxied: {})",
        escape_html(&record.record_type),
        escape_html(&record.name),
        escape_html(&record.content),
        on_off(record.is_proxied())
    )
}

pub fn format_record_list(domain: &str, records: &[DnsRecord]) -> String {
    if records.is_empty() {
        return format!("ℹ️ No DNS records found for {}", code(domain));
    }

    let mut out = format!("📋 <b>DNS records for {}</b>\n", escape_html(domain));
    for r in records {
        out.push('\n');
        out.push_str(&format_record_line(r));
    }
    out
}

pub fn format_name_servers(zone: &ZoneDetail) -> String {
    let mut out = format!("🌐 <b>Name servers for {}</b>\n", escape_html(&zone.name));
    if zone.name_servers.is_empty() {
        out.push_str("\n(none assigned yet)");
    }
    for ns in &zone.name_servers {
        out.push('\n');
        out.push_str(&code(ns));
    }
    out
}

pub fn format_zone_status(zone: &ZoneDetail, label: &str) -> String {
    format!(
        "📊 <b>{}</b>\nAccount: {}\nStatus: {}\nPaused: {}",
        escape_html(&zone.name),
        escape_html(label),
        escape_html(&zone.status),
        if zone.paused { "yes" } else { "no" }
    )
}

/// Alert body for a zone hosted in one of our accounts.
pub fn format_hosted_alert(
    domain: &str,
    label: &str,
    expiry: NaiveDate,
    days_left: i64,
    auto_delete: bool,
) -> String {
    let mut out = format!(
        "⚠️ <b>Domain expiring soon</b>\n\nDomain: {}\nAccount: {}\nExpires: {} ({})",
        code(domain),
        escape_html(label),
        expiry.format(CANONICAL_FORMAT),
        days_phrase(days_left)
    );
    if auto_delete {
        out.push_str(
            "\n\n<i>If nobody responds, the zone is deleted automatically one day before \
             expiry.</i>",
        );
    }
    out
}

/// Alert body for a domain from an inventory file, which we cannot act on.
pub fn format_external_alert(
    domain: &str,
    source: &str,
    expiry: NaiveDate,
    days_left: i64,
) -> String {
    format!(
        "⚠️ <b>Domain expiring soon</b>\n\nDomain: {}\nSource: {}\nExpires: {} ({})\n\n\
         Not hosted in a managed account; handle manually.",
        code(domain),
        escape_html(source),
        expiry.format(CANONICAL_FORMAT),
        days_phrase(days_left)
    )
}

fn days_phrase(days: i64) -> String {
    match days {
        d if d < 0 => format!("expired {} day(s) ago", -d),
        0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        d => format!("in {d} days"),
    }
}

pub fn truncate_one_line(text: &str, max_len: usize) -> String {
    let cleaned = text.replace('\n', " ").trim().to_string();
    if cleaned.chars().count() <= max_len {
        return cleaned;
    }
    format!("{}...", cleaned.chars().take(max_len).collect::<String>())
}

/// Split `text` into chunks of at most `max_len` characters.
///
/// Breaks fall between lines so tags opened on a line are closed in the same chunk; only a
/// single line longer than `max_len` is cut mid-line.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let sep = usize::from(!cur.is_empty());
        if cur_len + sep + line_len <= max_len {
            if sep == 1 {
                cur.push('\n');
            }
            cur.push_str(line);
            cur_len += sep + line_len;
            continue;
        }

        if !cur.is_empty() {
            out.push(std::mem::take(&mut cur));
            cur_len = 0;
        }
        if line_len <= max_len {
            cur.push_str(line);
            cur_len = line_len;
            continue;
        }
        let chars: Vec<char> = line.chars().collect();
        for piece in chars.chunks(max_len) {
            out.push(piece.iter().collect());
        }
    }

    if !cur.is_empty() || out.is_empty() {
        out.push(cur);
    }
    out
}
