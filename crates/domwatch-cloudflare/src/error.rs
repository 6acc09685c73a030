//! Cloudflare error-code mapping.
//!
//! Reference: <https://api.cloudflare.com/#getting-started-responses>

use domwatch_core::errors::Error;

use crate::types::CloudflareError;

/// Map the first API error of a failed response.
pub fn map_api_error(errors: &[CloudflareError], domain: &str) -> Error {
    let Some(first) = errors.first() else {
        return Error::Transport("cloudflare: request failed without error details".to_string());
    };

    match first.code {
        // 7000: No route for that URI
        // 7003: Could not route, object identifier invalid
        // 1001: Invalid zone identifier
        7000 | 7003 | 1001 => Error::zone_not_found(domain),

        // 6003/6103/6111: malformed auth headers
        // 9109: unauthorized / max auth failures
        // 10000: authentication error
        6003 | 6103 | 6111 | 9109 | 10000 => Error::Transport(format!(
            "cloudflare authentication failed ({}): {}",
            first.code, first.message
        )),

        code => Error::Transport(format!("cloudflare error {code}: {}", first.message)),
    }
}
