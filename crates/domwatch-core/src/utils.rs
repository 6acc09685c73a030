use std::{
    fs::OpenOptions,
    future::Future,
    io::Write,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::Utc;
use serde::Serialize;

use crate::{domain::Actor, errors::Error, Result};

/// RFC3339 timestamp in UTC (for logs/audit).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

/// Run `fut` under a deadline; an expired deadline becomes [`Error::Timeout`] naming `op`.
pub async fn with_deadline<T, F>(op: impl Into<String>, after: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => Err(Error::Timeout {
            op: op.into(),
            after,
        }),
    }
}

// ============== Audit Logging ==============

const AUDIT_MAX_TEXT: usize = 500;

/// One user-triggered action (button press or console command) and how it ended.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditEvent {
    pub fn action(
        actor: &Actor,
        action: &str,
        account: Option<&str>,
        domain: Option<&str>,
        outcome: std::result::Result<(), &str>,
    ) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "action".to_string(),
            user_id: actor.user_id.0,
            username: actor.username.clone(),
            action: action.to_string(),
            account: account.map(str::to_string),
            domain: domain.map(str::to_string),
            success: outcome.is_ok(),
            error: outcome.err().map(str::to_string),
        }
    }

    /// Actions the system takes on its own (auto-delete) are logged under a fixed actor.
    pub fn system(
        action: &str,
        account: &str,
        domain: &str,
        outcome: std::result::Result<(), &str>,
    ) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: "system".to_string(),
            user_id: 0,
            username: Some("system".to_string()),
            action: action.to_string(),
            account: Some(account.to_string()),
            domain: Some(domain.to_string()),
            success: outcome.is_ok(),
            error: outcome.err().map(str::to_string),
        }
    }

    /// `2025-03-01T10:00:00+00:00 action=pause user=9(@ops) account=FL domain=a.com ok`
    fn to_plain_line(&self) -> String {
        let mut out = format!(
            "{} {}={} user={}",
            self.timestamp, self.event, self.action, self.user_id
        );
        if let Some(name) = &self.username {
            out.push_str(&format!("(@{name})"));
        }
        if let Some(account) = &self.account {
            out.push_str(&format!(" account={account}"));
        }
        if let Some(domain) = &self.domain {
            out.push_str(&format!(" domain={domain}"));
        }
        match &self.error {
            None if self.success => out.push_str(" ok"),
            None => out.push_str(" failed"),
            Some(err) => out.push_str(&format!(" failed: {err}")),
        }
        out
    }
}

/// Append-only audit trail of user actions, plain text or JSON lines.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.error {
            event.error = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = if self.json {
            serde_json::to_string(&event)?
        } else {
            event.to_plain_line()
        };
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Write and log on failure; an unwritable audit file never blocks an action report.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.write(event) {
            tracing::warn!("[AUDIT] failed to write {}: {e}", self.path.display());
        }
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::UserId;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    fn actor() -> Actor {
        Actor {
            user_id: UserId(9),
            username: Some("ops".to_string()),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_maps_to_timeout_error() {
        let res: Result<()> = with_deadline("whois slow.test", Duration::from_secs(2), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        match res {
            Err(Error::Timeout { op, after }) => {
                assert_eq!(op, "whois slow.test");
                assert_eq!(after, Duration::from_secs(2));
            }
            other => panic!("expected timeout, got {other:?}"),
        }

        let ok = with_deadline("fast", Duration::from_secs(2), async { Ok(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
        assert_eq!(t.chars().count(), AUDIT_MAX_TEXT + 3);
    }

    #[test]
    fn json_lines_are_appended() {
        let log = AuditLogger::new(tmp_file("domwatch-audit-json"), true);
        log.write(AuditEvent::action(
            &actor(),
            "delete_confirm",
            Some("FL"),
            Some("example.com"),
            Ok(()),
        ))
        .unwrap();
        log.write(AuditEvent::action(
            &actor(),
            "pause",
            Some("FL"),
            Some("example.com"),
            Err("503"),
        ))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["success"], false);
        assert_eq!(second["error"], "503");
        assert_eq!(second["username"], "ops");

        let _ = std::fs::remove_file(log.path());
    }

    #[test]
    fn plain_format_lists_fields() {
        let log = AuditLogger::new(tmp_file("domwatch-audit-plain"), false);
        log.write(AuditEvent::system("auto_delete", "FL", "example.com", Ok(())))
            .unwrap();
        let written = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(written.lines().count(), 1);
        assert!(written.contains("system=auto_delete user=0(@system)"));
        assert!(written.contains("account=FL domain=example.com ok"));

        let _ = std::fs::remove_file(log.path());
    }
}
