//! Alert loop: wait for the queue, drain it, alert per entry, truncate, cool down.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    callback::alert_keyboard,
    config::Config,
    domain::DomainRecord,
    expiry::days_until,
    formatting::{escape_html, format_external_alert, format_hosted_alert},
    messaging::port::MessagingPort,
    ports::DnsProvider,
    queue::FileQueue,
    tasks::{Report, TaskPool},
    utils::{with_deadline, AuditEvent, AuditLogger},
    Result,
};

/// Outcome of one pass over the queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchPass {
    /// Queue file absent; nothing produced yet.
    Waiting,
    /// The batch was drained and the file truncated.
    Drained { alerted: usize, skipped: usize },
}

pub struct AlertDispatcher {
    cfg: Arc<Config>,
    provider: Arc<dyn DnsProvider>,
    messenger: Arc<dyn MessagingPort>,
    queue: Arc<FileQueue>,
    pool: TaskPool,
    audit: AuditLogger,
}

impl AlertDispatcher {
    pub fn new(
        cfg: Arc<Config>,
        provider: Arc<dyn DnsProvider>,
        messenger: Arc<dyn MessagingPort>,
        queue: Arc<FileQueue>,
        pool: TaskPool,
        audit: AuditLogger,
    ) -> Self {
        Self {
            cfg,
            provider,
            messenger,
            queue,
            pool,
            audit,
        }
    }

    /// Poll forever. Run exactly one of these per queue file.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("[ALERT] dispatcher watching {}", self.queue.path().display());
        loop {
            let wait = match self.run_once(Utc::now().date_naive()).await {
                Ok(DispatchPass::Waiting) => self.cfg.queue_poll_interval,
                Ok(DispatchPass::Drained { alerted, skipped }) => {
                    info!("[ALERT] batch done: {alerted} alert(s), {skipped} skipped");
                    self.cfg.dispatch_cooldown
                }
                Err(e) => {
                    error!("[ALERT] queue pass failed: {e}");
                    self.cfg.queue_poll_interval
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }
        info!("[ALERT] dispatcher stopped");
    }

    /// Drain the queue once, alerting relative to `today`.
    pub async fn run_once(&self, today: NaiveDate) -> Result<DispatchPass> {
        let Some(drain) = self.queue.begin_drain().await? else {
            return Ok(DispatchPass::Waiting);
        };

        let mut alerted = 0usize;
        let mut skipped = drain.skipped();
        for entry in drain.entries().iter().cloned() {
            let record = match entry.into_record(&self.cfg.accounts) {
                Ok(r) => r,
                Err(e) => {
                    warn!("[ALERT] skipping entry: {e}");
                    skipped += 1;
                    continue;
                }
            };

            if alerted > 0 && !self.cfg.alert_message_delay.is_zero() {
                tokio::time::sleep(self.cfg.alert_message_delay).await;
            }
            self.alert(&record, today).await;
            alerted += 1;
        }

        drain.finish().await?;
        Ok(DispatchPass::Drained { alerted, skipped })
    }

    async fn alert(&self, record: &DomainRecord, today: NaiveDate) {
        let Some(expiry) = record.expiry else {
            return;
        };
        let days = days_until(expiry, today);
        let chat = self.cfg.alert_chat_id;

        if !record.is_provider_hosted {
            let text = format_external_alert(&record.domain, &record.source, expiry, days);
            if let Err(e) = self.messenger.send_html(chat, &text).await {
                error!("[ALERT] failed to alert {}: {e}", record.domain);
            }
            return;
        }

        let text = format_hosted_alert(
            &record.domain,
            &record.source,
            expiry,
            days,
            self.cfg.auto_delete,
        );
        let sent = match alert_keyboard(&record.source, &record.domain) {
            Some(keyboard) => {
                self.messenger
                    .send_inline_keyboard(chat, &text, keyboard)
                    .await
            }
            None => {
                warn!(
                    "[ALERT] buttons for {} exceed the callback size limit; sending plain alert",
                    record.domain
                );
                self.messenger.send_html(chat, &text).await
            }
        };
        if let Err(e) = sent {
            error!("[ALERT] failed to alert {}: {e}", record.domain);
        }

        if days == 1 && self.cfg.auto_delete {
            self.spawn_auto_delete(record);
        }
    }

    fn spawn_auto_delete(&self, record: &DomainRecord) {
        let provider = self.provider.clone();
        let cfg = self.cfg.clone();
        let audit = self.audit.clone();
        let label = record.source.clone();
        let domain = record.domain.clone();

        info!("[ALERT] auto-deleting {domain} from {label}");
        self.pool.spawn(format!("auto-delete {domain}"), async move {
            let Some(account) = cfg.accounts.by_label(&label) else {
                warn!("[ALERT] unknown account {label} for auto-delete of {domain}");
                return Report::Silent;
            };
            let res = with_deadline(
                format!("delete {domain}"),
                cfg.provider_timeout,
                provider.delete_zone(account, &domain),
            )
            .await;

            let err = res.as_ref().err().map(|e| e.to_string());
            audit.record(AuditEvent::system(
                "auto_delete",
                &label,
                &domain,
                match &err {
                    Some(e) => Err(e.as_str()),
                    None => Ok(()),
                },
            ));

            match err {
                None => Report::Text(format!(
                    "✅ Auto-deleted zone {} ({}) one day before expiry",
                    escape_html(&domain),
                    escape_html(&label)
                )),
                Some(e) => Report::Text(format!(
                    "⚠️ Auto-delete of {} ({}) failed: {}",
                    escape_html(&domain),
                    escape_html(&label),
                    escape_html(&e)
                )),
            }
        });
    }
}
