use chrono::NaiveDate;

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// The chat user behind a button press or command, kept for the audit trail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub username: Option<String>,
}

impl Actor {
    /// Name shown in chat reports: `@username`, or the numeric id when the user has none.
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(name) if !name.is_empty() => format!("@{name}"),
            _ => format!("id:{}", self.user_id.0),
        }
    }
}

/// A candidate domain and where it came from.
///
/// `source` is either a provider account label or an inventory file path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DomainRecord {
    pub domain: String,
    pub source: String,
    pub expiry: Option<NaiveDate>,
    pub is_provider_hosted: bool,
}

impl DomainRecord {
    pub fn hosted(domain: &str, label: &str) -> Self {
        Self {
            domain: normalize_domain(domain),
            source: label.to_string(),
            expiry: None,
            is_provider_hosted: true,
        }
    }

    pub fn inventory(domain: &str, path: &str) -> Self {
        Self {
            domain: normalize_domain(domain),
            source: path.to_string(),
            expiry: None,
            is_provider_hosted: false,
        }
    }
}

/// Domains are compared and looked up in lowercase only.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_lowercase()
}
