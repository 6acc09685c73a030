//! Request plumbing: auth header, envelope decoding, error mapping.

use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use domwatch_core::{accounts::Account, errors::Error, Result};

use crate::{error::map_api_error, types::CloudflareResponse, CloudflareProvider};

impl CloudflareProvider {
    /// Send one request and return the decoded envelope, already checked for `success`.
    ///
    /// `domain` only labels errors (a missing zone maps to `ZoneNotFound { domain }`).
    pub(crate) async fn send<T, B>(
        &self,
        account: &Account,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
        domain: &str,
    ) -> Result<CloudflareResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{path}", self.base_url);
        debug!("[CF] {method} {url} ({})", account.label);

        let mut req = self
            .client
            .request(method, &url)
            .bearer_auth(&account.api_token);
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(b);
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Transport(format!("cloudflare request timed out: {url}"))
            } else {
                Error::Transport(format!("cloudflare request failed: {e}"))
            }
        })?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("reading cloudflare response: {e}")))?;

        decode(status.as_u16(), &text, domain)
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        account: &Account,
        path: &str,
        query: &[(&str, String)],
        domain: &str,
    ) -> Result<CloudflareResponse<T>> {
        self.send::<T, ()>(account, Method::GET, path, query, None, domain)
            .await
    }
}

/// Parse a response body into the envelope and turn API failures into core errors.
pub(crate) fn decode<T: DeserializeOwned>(
    status: u16,
    body: &str,
    domain: &str,
) -> Result<CloudflareResponse<T>> {
    let parsed: CloudflareResponse<T> = serde_json::from_str(body).map_err(|e| {
        Error::Parse(format!(
            "cloudflare returned HTTP {status} with an unreadable body: {e}"
        ))
    })?;

    if !parsed.success {
        return Err(map_api_error(&parsed.errors, domain));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CloudflareZone;

    #[test]
    fn decodes_successful_zone_list() {
        let body = r#"{
            "success": true,
            "errors": [],
            "result": [
                {"id": "z1", "name": "example.com", "status": "active", "paused": false,
                 "name_servers": ["ada.ns.cloudflare.com", "bob.ns.cloudflare.com"]}
            ],
            "result_info": {"page": 1, "per_page": 50, "total_count": 1}
        }"#;
        let resp: CloudflareResponse<Vec<CloudflareZone>> =
            decode(200, body, "example.com").unwrap();
        let zones = resp.result.unwrap();
        assert_eq!(zones[0].name_servers.len(), 2);
        assert!(!resp.result_info.unwrap().has_more());
    }

    #[test]
    fn failed_envelope_maps_error_code() {
        let body = r#"{
            "success": false,
            "errors": [{"code": 7003, "message": "Could not route"}],
            "result": null
        }"#;
        let err = decode::<Vec<CloudflareZone>>(404, body, "gone.com").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn non_json_body_is_parse_error() {
        let err =
            decode::<Vec<CloudflareZone>>(502, "<html>bad gateway</html>", "a.com").unwrap_err();
        assert!(matches!(err, Error::Parse(ref s) if s.contains("502")));
    }
}
