//! Cloudflare v4 API payloads.

use serde::{Deserialize, Serialize};

use domwatch_core::ports::{DnsRecord, ZoneDetail, ZoneSummary};

/// Envelope around every Cloudflare response.
#[derive(Debug, Deserialize)]
pub struct CloudflareResponse<T> {
    pub success: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub errors: Vec<CloudflareError>,
    pub result_info: Option<CloudflareResultInfo>,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CloudflareResultInfo {
    pub page: u32,
    pub per_page: u32,
    #[serde(default)]
    pub total_count: u32,
}

impl CloudflareResultInfo {
    pub fn has_more(&self) -> bool {
        self.page.saturating_mul(self.per_page) < self.total_count
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareZone {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub paused: bool,
    #[serde(default)]
    pub name_servers: Vec<String>,
}

impl From<CloudflareZone> for ZoneDetail {
    fn from(z: CloudflareZone) -> Self {
        Self {
            id: z.id,
            name: z.name,
            name_servers: z.name_servers,
            status: z.status,
            paused: z.paused,
        }
    }
}

impl From<&CloudflareZone> for ZoneSummary {
    fn from(z: &CloudflareZone) -> Self {
        Self {
            name: z.name.clone(),
            status: z.status.clone(),
            paused: z.paused,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudflareDnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: Option<bool>,
}

impl From<CloudflareDnsRecord> for DnsRecord {
    fn from(r: CloudflareDnsRecord) -> Self {
        Self {
            id: r.id,
            record_type: r.record_type,
            name: r.name,
            content: r.content,
            proxied: r.proxied,
            ttl: r.ttl,
        }
    }
}

/// Body for record create (POST) and overwrite (PUT).
#[derive(Debug, Serialize)]
pub struct DnsRecordBody<'a> {
    #[serde(rename = "type")]
    pub record_type: &'a str,
    pub name: &'a str,
    pub content: &'a str,
    pub ttl: u32,
    pub proxied: bool,
}

#[derive(Debug, Serialize)]
pub struct CreateZoneBody<'a> {
    pub name: &'a str,
    #[serde(rename = "type")]
    pub zone_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountRef<'a>>,
}

#[derive(Debug, Serialize)]
pub struct AccountRef<'a> {
    pub id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct IdOnly {
    #[allow(dead_code)]
    pub id: String,
}
