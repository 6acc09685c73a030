use std::time::Duration;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the pipeline can tell an
/// expected "zone not found" apart from transport failures and bad input.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("zone not found: {domain}")]
    ZoneNotFound { domain: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("{op} timed out after {}s", .after.as_secs())]
    Timeout { op: String, after: Duration },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("malformed input: {0}")]
    Malformed(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    pub fn zone_not_found(domain: impl Into<String>) -> Self {
        Self::ZoneNotFound {
            domain: domain.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ZoneNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
