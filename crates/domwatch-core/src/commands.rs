//! Operator console: `/dns`, `/getns`, `/status`, `/setdns`, `/help`.

use std::sync::Arc;

use rand::Rng;
use tracing::{info, warn};

use crate::{
    accounts::Account,
    config::Config,
    domain::normalize_domain,
    errors::Error,
    formatting::{
        escape_html, format_name_servers, format_record_line, format_record_list,
        format_zone_status,
    },
    messaging::types::Command,
    ports::{DnsProvider, DnsRecordParams, ZoneDetail},
    security::{is_alert_chat, is_authorized},
    tasks::{Report, TaskPool},
    utils::{with_deadline, AuditEvent, AuditLogger},
    Result,
};

const HELP: &str = "<b>Commands</b>\n\
/dns &lt;domain&gt; - list DNS records\n\
/getns &lt;domain&gt; - show name servers (adds the zone if missing)\n\
/status &lt;domain&gt; - zone status\n\
/setdns &lt;type&gt; &lt;name&gt; &lt;content&gt; &lt;on|off&gt; [domain] - \
create or update a record";

const SETDNS_USAGE: &str = "Usage: \
/setdns &lt;type&gt; &lt;name&gt; &lt;content&gt; &lt;on|off&gt; [domain]\n\
Example: /setdns cname app.example.com lb-1234.elb.us-west-1.amazonaws.com on";

/// Zone apex for a record name: its last two labels (`a.b.example.com` → `example.com`).
pub fn derive_domain_from_name(name: &str) -> Option<String> {
    let parts: Vec<&str> = name.trim().split('.').collect();
    if parts.len() < 2 || parts.iter().rev().take(2).any(|p| p.is_empty()) {
        return None;
    }
    Some(normalize_domain(&parts[parts.len() - 2..].join(".")))
}

#[derive(Clone)]
pub struct CommandHandler {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Arc<Config>,
    provider: Arc<dyn DnsProvider>,
    pool: TaskPool,
    audit: AuditLogger,
}

impl CommandHandler {
    pub fn new(
        cfg: Arc<Config>,
        provider: Arc<dyn DnsProvider>,
        pool: TaskPool,
        audit: AuditLogger,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                provider,
                pool,
                audit,
            }),
        }
    }

    /// Whether this handler owns the command name.
    pub fn knows(name: &str) -> bool {
        matches!(name, "dns" | "getns" | "status" | "setdns" | "help" | "start")
    }

    /// Gate the command and run it on the task pool.
    pub fn handle(&self, cmd: Command) {
        let cfg = &self.inner.cfg;
        if !is_alert_chat(cmd.chat_id, cfg.alert_chat_id) {
            return;
        }
        if !Self::knows(&cmd.name) {
            return;
        }
        if !is_authorized(&cmd.actor, &cfg.telegram_allowed_users) {
            warn!("[CMD] unauthorized /{} by {}", cmd.name, cmd.actor.display_name());
            self.inner.pool.spawn("unauthorized", async {
                Report::Text("Unauthorized. Contact the bot owner for access.".to_string())
            });
            return;
        }

        info!("[CMD] /{} {} by {}", cmd.name, cmd.args, cmd.actor.display_name());
        let this = self.clone();
        self.inner
            .pool
            .spawn(format!("/{}", cmd.name), async move { this.execute(cmd).await });
    }

    pub async fn execute(&self, cmd: Command) -> Report {
        let args: Vec<&str> = cmd.args.split_whitespace().collect();
        match cmd.name.as_str() {
            "dns" => self.dns(&args).await,
            "getns" => self.getns(&cmd, &args).await,
            "status" => self.status(&args).await,
            "setdns" => self.setdns(&cmd, &args).await,
            _ => Report::Text(HELP.to_string()),
        }
    }

    async fn dns(&self, args: &[&str]) -> Report {
        let Some(domain) = args.first().map(|d| normalize_domain(d)) else {
            return text("Usage: /dns &lt;domain&gt;");
        };

        let (account, zone) = match self.find_zone(&domain).await {
            Ok(found) => found,
            Err(e) => return not_found_or_failed(&domain, e),
        };

        match self
            .call(
                format!("list records {}", zone.name),
                self.inner.provider.list_dns_records(account, &zone.name),
            )
            .await
        {
            Ok(records) => {
                let mut out = format_record_list(&zone.name, &records);
                out.push_str(&format!("\n\nAccount: {}", escape_html(&account.label)));
                Report::Text(out)
            }
            Err(e) => text(&format!(
                "❌ Could not list records for {}: {}",
                escape_html(&domain),
                escape_html(&e.to_string())
            )),
        }
    }

    async fn getns(&self, cmd: &Command, args: &[&str]) -> Report {
        let Some(domain) = args.first().map(|d| normalize_domain(d)) else {
            return text("Usage: /getns &lt;domain&gt;");
        };

        match self.find_zone(&domain).await {
            Ok((account, zone)) => {
                return text(&format!(
                    "{}\n\nAlready in account {}",
                    format_name_servers(&zone),
                    escape_html(&account.label)
                ))
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                return text(&format!(
                    "❌ Lookup failed for {}: {}",
                    escape_html(&domain),
                    escape_html(&e.to_string())
                ))
            }
        }

        let Some(account) = self.pick_account() else {
            return text("No provider accounts configured; cannot add the zone.");
        };

        let res = self
            .call(
                format!("create zone {domain}"),
                self.inner.provider.create_zone(account, &domain),
            )
            .await;
        self.audit(cmd, "create_zone", account, &domain, &res);
        match res {
            Ok(zone) => text(&format!(
                "{}\n\nAdded to account {}. Point the registrar at these name servers.",
                format_name_servers(&zone),
                escape_html(&account.label)
            )),
            Err(e) => text(&format!(
                "❌ Could not add {} to {}: {}",
                escape_html(&domain),
                escape_html(&account.label),
                escape_html(&e.to_string())
            )),
        }
    }

    async fn status(&self, args: &[&str]) -> Report {
        let Some(domain) = args.first().map(|d| normalize_domain(d)) else {
            return text("Usage: /status &lt;domain&gt;");
        };
        match self.find_zone(&domain).await {
            Ok((account, zone)) => Report::Text(format_zone_status(&zone, &account.label)),
            Err(e) => not_found_or_failed(&domain, e),
        }
    }

    async fn setdns(&self, cmd: &Command, args: &[&str]) -> Report {
        if args.len() < 4 {
            return text(SETDNS_USAGE);
        }
        let record_type = args[0].to_uppercase();
        let name = args[1].to_string();
        let content = args[2].to_string();
        let proxied = args[3].eq_ignore_ascii_case("on");

        let domain = match args.get(4) {
            Some(d) => Some(normalize_domain(d)),
            None => derive_domain_from_name(&name),
        };
        let Some(domain) = domain else {
            return text("Use a fully qualified name or pass the domain explicitly.");
        };

        let (account, zone) = match self.find_zone(&domain).await {
            Ok(found) => found,
            Err(e) => return not_found_or_failed(&domain, e),
        };

        let params = DnsRecordParams {
            record_type,
            name,
            content,
            proxied,
            ttl: 0,
        };
        let res = self
            .call(
                format!("upsert record in {}", zone.name),
                self.inner
                    .provider
                    .upsert_dns_record(account, &zone.name, params),
            )
            .await;
        self.audit(cmd, "setdns", account, &zone.name, &res);
        match res {
            Ok(record) => text(&format!(
                "✅ Record set in {}: {}",
                escape_html(&account.label),
                format_record_line(&record)
            )),
            Err(e) => text(&format!(
                "❌ Could not set record: {}",
                escape_html(&e.to_string())
            )),
        }
    }

    /// First account holding the zone. "Not found" moves on to the next account; any
    /// other failure stops the search.
    async fn find_zone(&self, domain: &str) -> Result<(&Account, ZoneDetail)> {
        for account in self.inner.cfg.accounts.iter() {
            let res = self
                .call(
                    format!("zone details {domain}"),
                    self.inner.provider.zone_details(account, domain),
                )
                .await;
            match res {
                Ok(zone) => return Ok((account, zone)),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(Error::zone_not_found(domain))
    }

    fn pick_account(&self) -> Option<&Account> {
        let accounts = self.inner.cfg.accounts.as_slice();
        if accounts.is_empty() {
            return None;
        }
        accounts.get(rand::rng().random_range(0..accounts.len()))
    }

    async fn call<T>(
        &self,
        op: String,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        with_deadline(op, self.inner.cfg.provider_timeout, fut).await
    }

    fn audit<T>(
        &self,
        cmd: &Command,
        action: &str,
        account: &Account,
        domain: &str,
        res: &Result<T>,
    ) {
        let err = res.as_ref().err().map(|e| e.to_string());
        self.inner.audit.record(AuditEvent::action(
            &cmd.actor,
            action,
            Some(&account.label),
            Some(domain),
            match &err {
                Some(e) => Err(e.as_str()),
                None => Ok(()),
            },
        ));
    }
}

fn text(s: &str) -> Report {
    Report::Text(s.to_string())
}

fn not_found_or_failed(domain: &str, e: Error) -> Report {
    if e.is_not_found() {
        return text(&format!(
            "ℹ️ {} is not in any configured account.",
            escape_html(domain)
        ));
    }
    text(&format!(
        "❌ Lookup failed for {}: {}",
        escape_html(domain),
        escape_html(&e.to_string())
    ))
}
