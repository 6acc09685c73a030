//! Daily expiry check: collect, look up, filter, hand off.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::{
    collector::DomainCollector,
    config::Config,
    domain::DomainRecord,
    expiry,
    ports::{DnsProvider, WhoisClient},
    queue::{FileQueue, QueueEntry},
    utils::with_deadline,
    Result,
};

pub struct ExpiryChecker {
    cfg: Arc<Config>,
    whois: Arc<dyn WhoisClient>,
    collector: DomainCollector,
    queue: Arc<FileQueue>,
}

impl ExpiryChecker {
    pub fn new(
        cfg: Arc<Config>,
        provider: Arc<dyn DnsProvider>,
        whois: Arc<dyn WhoisClient>,
        queue: Arc<FileQueue>,
    ) -> Self {
        let collector = DomainCollector::new(provider, cfg.provider_timeout);
        Self {
            cfg,
            whois,
            collector,
            queue,
        }
    }

    /// One full cycle. Returns how many domains were queued for alerting.
    pub async fn run_cycle(&self) -> Result<usize> {
        info!("[CHECK] cycle started");
        let candidates = self
            .collector
            .collect(&self.cfg.accounts, &self.cfg.domain_files)
            .await;
        info!("[CHECK] {} candidate domain(s)", candidates.len());

        let expiring = self.check(candidates, Utc::now()).await;

        let entries: Vec<QueueEntry> =
            expiring.iter().filter_map(QueueEntry::from_record).collect();
        self.queue.replace(&entries).await?;
        info!("[CHECK] cycle finished: {} domain(s) expiring", entries.len());
        Ok(entries.len())
    }

    /// Look up each record in order, one at a time, and keep the ones expiring within the
    /// alert window. Failed lookups and unparsable answers skip the domain until the next
    /// cycle.
    pub async fn check(&self, records: Vec<DomainRecord>, now: DateTime<Utc>) -> Vec<DomainRecord> {
        let mut expiring = Vec::new();

        for (i, mut record) in records.into_iter().enumerate() {
            if i > 0 && !self.cfg.whois_rate_limit.is_zero() {
                tokio::time::sleep(self.cfg.whois_rate_limit).await;
            }

            let raw = match with_deadline(
                format!("whois {}", record.domain),
                self.cfg.whois_timeout,
                self.whois.query(&record.domain),
            )
            .await
            {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("[CHECK] lookup failed for {}: {e}", record.domain);
                    continue;
                }
            };

            let Some(date) = expiry::extract(&raw) else {
                warn!(
                    "[CHECK] no expiry date for {} in lookup output:\n{raw}",
                    record.domain
                );
                continue;
            };

            record.expiry = Some(date);
            if expiry::is_expiring(date, now, self.cfg.alert_window) {
                info!(
                    "[CHECK] {} ({}) expires {}",
                    record.domain,
                    record.source,
                    date.format(expiry::CANONICAL_FORMAT)
                );
                expiring.push(record);
            }
        }

        expiring
    }
}
