//! Candidate-domain collection from provider accounts and inventory files.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tracing::{info, warn};

use crate::{
    accounts::Accounts,
    domain::DomainRecord,
    ports::DnsProvider,
    utils::with_deadline,
};

pub struct DomainCollector {
    provider: Arc<dyn DnsProvider>,
    provider_timeout: Duration,
}

impl DomainCollector {
    pub fn new(provider: Arc<dyn DnsProvider>, provider_timeout: Duration) -> Self {
        Self {
            provider,
            provider_timeout,
        }
    }

    /// All provider domains (account order) followed by inventory domains (file, then line
    /// order). Best effort: a failing source is logged and skipped. Duplicates across
    /// sources are kept, each with its own `source`.
    pub async fn collect(
        &self,
        accounts: &Accounts,
        inventory_files: &[PathBuf],
    ) -> Vec<DomainRecord> {
        let mut out = Vec::new();

        for account in accounts.iter() {
            let fetched = with_deadline(
                format!("fetch zones for {}", account.label),
                self.provider_timeout,
                self.provider.fetch_domains(account),
            )
            .await;

            match fetched {
                Ok(zones) => {
                    let before = out.len();
                    out.extend(
                        zones
                            .iter()
                            .filter(|z| z.is_monitored())
                            .map(|z| DomainRecord::hosted(&z.name, &account.label)),
                    );
                    info!(
                        "[CHECK] account {}: {} active zone(s)",
                        account.label,
                        out.len() - before
                    );
                }
                Err(e) => warn!("[CHECK] skipping account {}: {e}", account.label),
            }
        }

        for path in inventory_files {
            let shown = path.to_string_lossy().to_string();
            match tokio::fs::read_to_string(path).await {
                Ok(contents) => {
                    let before = out.len();
                    out.extend(
                        contents
                            .lines()
                            .map(str::trim)
                            .filter(|l| !l.is_empty())
                            .map(|l| DomainRecord::inventory(l, &shown)),
                    );
                    info!("[CHECK] inventory {shown}: {} domain(s)", out.len() - before);
                }
                Err(e) => warn!("[CHECK] skipping inventory {shown}: {e}"),
            }
        }

        out
    }
}
