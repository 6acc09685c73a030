//! Capability ports for the external collaborators: the DNS host and WHOIS/RDAP lookups.
//!
//! The chat transport port lives in [`crate::messaging::port`].

use async_trait::async_trait;

use crate::{accounts::Account, Result};

/// A zone as returned by the account-wide listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneSummary {
    pub name: String,
    pub status: String,
    pub paused: bool,
}

impl ZoneSummary {
    /// Only active, non-paused zones are candidates for expiry checks.
    pub fn is_monitored(&self) -> bool {
        self.status.eq_ignore_ascii_case("active") && !self.paused
    }
}

/// Fresh zone details, fetched per request and never cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneDetail {
    pub id: String,
    pub name: String,
    pub name_servers: Vec<String>,
    pub status: String,
    pub paused: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: Option<bool>,
    pub ttl: u32,
}

impl DnsRecord {
    pub fn is_proxied(&self) -> bool {
        self.proxied.unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsRecordParams {
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub proxied: bool,
    /// 0 means "automatic".
    pub ttl: u32,
}

/// DNS-hosting provider capability.
///
/// Every zone-targeted call resolves the domain to a zone id by name first and fails with
/// [`crate::Error::ZoneNotFound`] when the account has no such zone.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn fetch_domains(&self, account: &Account) -> Result<Vec<ZoneSummary>>;

    async fn list_dns_records(&self, account: &Account, domain: &str) -> Result<Vec<DnsRecord>>;

    async fn pause_zone(&self, account: &Account, domain: &str, pause: bool) -> Result<()>;

    async fn delete_zone(&self, account: &Account, domain: &str) -> Result<()>;

    async fn zone_details(&self, account: &Account, domain: &str) -> Result<ZoneDetail>;

    async fn create_zone(&self, account: &Account, domain: &str) -> Result<ZoneDetail>;

    async fn upsert_dns_record(
        &self,
        account: &Account,
        domain: &str,
        params: DnsRecordParams,
    ) -> Result<DnsRecord>;
}

/// WHOIS/RDAP lookup capability: raw registration text for a domain.
#[async_trait]
pub trait WhoisClient: Send + Sync {
    async fn query(&self, domain: &str) -> Result<String>;
}
