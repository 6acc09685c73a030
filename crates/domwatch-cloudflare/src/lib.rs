//! Cloudflare v4 REST implementation of the core `DnsProvider` port.

mod error;
mod http;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::info;

use domwatch_core::{
    accounts::Account,
    errors::Error,
    ports::{DnsProvider, DnsRecord, DnsRecordParams, ZoneDetail, ZoneSummary},
    Result,
};

use types::{
    AccountRef, CloudflareDnsRecord, CloudflareZone, CreateZoneBody, DnsRecordBody, IdOnly,
};

pub const CF_API_BASE: &str = "https://api.cloudflare.com/client/v4";
/// Zones API page-size ceiling.
const MAX_PAGE_SIZE_ZONES: u32 = 50;
const MAX_PAGE_SIZE_RECORDS: u32 = 100;
/// Cloudflare's "automatic" TTL.
const TTL_AUTO: u32 = 1;

pub struct CloudflareProvider {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl CloudflareProvider {
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(CF_API_BASE, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("domwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn account_filter(account: &Account) -> Option<(&'static str, String)> {
        (!account.account_id.is_empty()).then(|| ("account.id", account.account_id.clone()))
    }

    /// Resolve a domain to its zone by listing zones filtered by name.
    async fn find_zone(&self, account: &Account, domain: &str) -> Result<CloudflareZone> {
        let mut query = vec![("name", domain.to_string())];
        query.extend(Self::account_filter(account));

        let resp = self
            .get::<Vec<CloudflareZone>>(account, "/zones", &query, domain)
            .await?;
        resp.result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| Error::zone_not_found(domain))
    }

    async fn zone_id(&self, account: &Account, domain: &str) -> Result<String> {
        Ok(self.find_zone(account, domain).await?.id)
    }

    async fn records_page(
        &self,
        account: &Account,
        zone_id: &str,
        domain: &str,
        mut query: Vec<(&str, String)>,
    ) -> Result<Vec<CloudflareDnsRecord>> {
        let path = format!("/zones/{zone_id}/dns_records");
        let mut out = Vec::new();
        let mut page = 1u32;
        let base_len = query.len();

        loop {
            query.truncate(base_len);
            query.push(("page", page.to_string()));
            query.push(("per_page", MAX_PAGE_SIZE_RECORDS.to_string()));

            let resp = self
                .get::<Vec<CloudflareDnsRecord>>(account, &path, &query, domain)
                .await?;
            let batch = resp.result.unwrap_or_default();
            let more = !batch.is_empty() && resp.result_info.map_or(false, |i| i.has_more());
            out.extend(batch);
            if !more {
                break;
            }
            page += 1;
        }
        Ok(out)
    }
}

/// Fully qualified record name inside `zone`: as-is when it already ends in the zone,
/// the apex for empty or `@`, otherwise `name.zone`.
pub fn record_fqdn(name: &str, zone: &str) -> String {
    let name = name.trim().trim_end_matches('.');
    let zone = zone.trim_end_matches('.');
    if name.is_empty() || name == "@" {
        return zone.to_string();
    }
    let lower = name.to_lowercase();
    let zone_lower = zone.to_lowercase();
    if lower == zone_lower || lower.ends_with(&format!(".{zone_lower}")) {
        return name.to_string();
    }
    format!("{name}.{zone}")
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn fetch_domains(&self, account: &Account) -> Result<Vec<ZoneSummary>> {
        let mut out = Vec::new();
        let mut page = 1u32;

        loop {
            let mut query = vec![
                ("status", "active".to_string()),
                ("page", page.to_string()),
                ("per_page", MAX_PAGE_SIZE_ZONES.to_string()),
            ];
            query.extend(Self::account_filter(account));

            let resp = self
                .get::<Vec<CloudflareZone>>(account, "/zones", &query, "")
                .await?;
            let zones = resp.result.unwrap_or_default();
            let more = !zones.is_empty() && resp.result_info.map_or(false, |i| i.has_more());
            out.extend(zones.iter().map(ZoneSummary::from));
            if !more {
                break;
            }
            page += 1;
        }

        Ok(out)
    }

    async fn list_dns_records(&self, account: &Account, domain: &str) -> Result<Vec<DnsRecord>> {
        let zone_id = self.zone_id(account, domain).await?;
        let records = self
            .records_page(account, &zone_id, domain, Vec::new())
            .await?;
        Ok(records.into_iter().map(DnsRecord::from).collect())
    }

    async fn pause_zone(&self, account: &Account, domain: &str, pause: bool) -> Result<()> {
        let zone_id = self.zone_id(account, domain).await?;
        self.send::<CloudflareZone, _>(
            account,
            Method::PATCH,
            &format!("/zones/{zone_id}"),
            &[],
            Some(&serde_json::json!({ "paused": pause })),
            domain,
        )
        .await?;
        info!("[CF] {domain} paused={pause} in {}", account.label);
        Ok(())
    }

    async fn delete_zone(&self, account: &Account, domain: &str) -> Result<()> {
        let zone_id = self.zone_id(account, domain).await?;
        self.send::<IdOnly, ()>(
            account,
            Method::DELETE,
            &format!("/zones/{zone_id}"),
            &[],
            None,
            domain,
        )
        .await?;
        info!("[CF] deleted zone {domain} from {}", account.label);
        Ok(())
    }

    async fn zone_details(&self, account: &Account, domain: &str) -> Result<ZoneDetail> {
        Ok(self.find_zone(account, domain).await?.into())
    }

    async fn create_zone(&self, account: &Account, domain: &str) -> Result<ZoneDetail> {
        let body = CreateZoneBody {
            name: domain,
            zone_type: "full",
            account: (!account.account_id.is_empty()).then(|| AccountRef {
                id: &account.account_id,
            }),
        };
        let resp = self
            .send::<CloudflareZone, _>(account, Method::POST, "/zones", &[], Some(&body), domain)
            .await?;
        let zone = resp
            .result
            .ok_or_else(|| Error::Parse("create zone response without result".to_string()))?;
        info!("[CF] created zone {domain} in {}", account.label);
        Ok(zone.into())
    }

    async fn upsert_dns_record(
        &self,
        account: &Account,
        domain: &str,
        params: DnsRecordParams,
    ) -> Result<DnsRecord> {
        let zone = self.find_zone(account, domain).await?;
        let record_type = params.record_type.to_uppercase();
        let fqdn = record_fqdn(&params.name, &zone.name);
        let ttl = if params.ttl == 0 { TTL_AUTO } else { params.ttl };

        let existing = self
            .records_page(
                account,
                &zone.id,
                domain,
                vec![("type", record_type.clone()), ("name", fqdn.clone())],
            )
            .await?;

        let body = DnsRecordBody {
            record_type: &record_type,
            name: &fqdn,
            content: &params.content,
            ttl,
            proxied: params.proxied,
        };
        let (method, path) = match existing.first() {
            Some(r) => (
                Method::PUT,
                format!("/zones/{}/dns_records/{}", zone.id, r.id),
            ),
            None => (Method::POST, format!("/zones/{}/dns_records", zone.id)),
        };

        let resp = self
            .send::<CloudflareDnsRecord, _>(account, method, &path, &[], Some(&body), domain)
            .await?;
        let record = resp
            .result
            .ok_or_else(|| Error::Parse("record response without result".to_string()))?;
        info!("[CF] upserted {record_type} {fqdn} in {}", account.label);
        Ok(record.into())
    }
}
