//! Registration lookups: RDAP first, port-43 WHOIS as fallback.
//!
//! Both paths return raw text for the core expiry extractor. The RDAP path renders its
//! expiration event as a single `Expiration Date:` line so the extractor needs no
//! RDAP-specific handling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use whois_rust::{WhoIs, WhoIsLookupOptions};

use domwatch_core::{errors::Error, ports::WhoisClient, Result};

pub const RDAP_BOOTSTRAP: &str = "https://rdap.org/domain";

const WHOIS_SERVERS: &str = include_str!("whois_servers.json");

#[derive(Debug, Deserialize)]
struct RdapDomain {
    #[serde(default)]
    events: Vec<RdapEvent>,
}

#[derive(Debug, Deserialize)]
struct RdapEvent {
    #[serde(rename = "eventAction")]
    action: String,
    #[serde(rename = "eventDate", default)]
    date: Option<String>,
}

/// The `expiration` event date of an RDAP domain object, if any.
fn rdap_expiration(body: &str) -> Option<String> {
    let domain: RdapDomain = serde_json::from_str(body).ok()?;
    domain
        .events
        .into_iter()
        .find(|e| e.action.eq_ignore_ascii_case("expiration"))
        .and_then(|e| e.date)
        .filter(|d| !d.trim().is_empty())
}

/// Share of the per-domain budget each path may use. Together they stay under the whole
/// budget, so a hung RDAP server still leaves port 43 time to answer.
fn split_budget(budget: Duration) -> (Duration, Duration) {
    (budget / 3, budget / 2)
}

pub struct RegistrationLookup {
    http: Client,
    whois: WhoIs,
    rdap_base: String,
    port43_timeout: Duration,
}

impl RegistrationLookup {
    /// `budget` is the whole time one `query` may take.
    pub fn new(budget: Duration) -> Result<Self> {
        Self::with_rdap_base(RDAP_BOOTSTRAP, budget)
    }

    pub fn with_rdap_base(rdap_base: impl Into<String>, budget: Duration) -> Result<Self> {
        let (rdap_timeout, port43_timeout) = split_budget(budget);
        let http = Client::builder()
            .timeout(rdap_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        let whois = WhoIs::from_string(WHOIS_SERVERS)
            .map_err(|e| Error::Config(format!("failed to load WHOIS server list: {e}")))?;
        Ok(Self {
            http,
            whois,
            rdap_base: rdap_base.into(),
            port43_timeout,
        })
    }

    async fn rdap(&self, domain: &str) -> Option<String> {
        let url = format!("{}/{domain}", self.rdap_base.trim_end_matches('/'));
        let resp = match self
            .http
            .get(&url)
            .header("Accept", "application/rdap+json")
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("RDAP {domain}: HTTP {}", r.status());
                return None;
            }
            Err(e) => {
                debug!("RDAP {domain} failed: {e}");
                return None;
            }
        };

        let body = resp.text().await.ok()?;
        rdap_expiration(&body)
    }

    async fn port43(&self, domain: &str) -> Result<String> {
        let mut options = WhoIsLookupOptions::from_string(domain)
            .map_err(|e| Error::Malformed(format!("invalid domain {domain}: {e}")))?;
        options.timeout = Some(self.port43_timeout);

        self.whois
            .lookup_async(options)
            .await
            .map_err(|e| Error::Transport(format!("WHOIS query for {domain} failed: {e}")))
    }
}

#[async_trait]
impl WhoisClient for RegistrationLookup {
    async fn query(&self, domain: &str) -> Result<String> {
        if let Some(date) = self.rdap(domain).await {
            return Ok(format!("{domain}: RDAP Expiration Date: {date}"));
        }

        match self.port43(domain).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("{e}");
                Err(e)
            }
        }
    }
}
