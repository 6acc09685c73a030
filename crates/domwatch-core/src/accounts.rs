use std::{collections::HashSet, env, path::Path};

use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// One DNS-hosting credential set. The label is the account's identity everywhere else
/// (queue `source` field, callback tokens, chat reports).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub label: String,
    pub api_token: String,
    #[serde(default)]
    pub account_id: String,
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("label", &self.label)
            .field("api_token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Immutable set of configured accounts, looked up by label.
#[derive(Clone, Debug, Default)]
pub struct Accounts {
    list: Vec<Account>,
}

impl Accounts {
    pub fn new(list: Vec<Account>) -> Result<Self> {
        let mut seen = HashSet::new();
        for acc in &list {
            if acc.label.trim().is_empty() {
                return Err(Error::Config("account with empty label".to_string()));
            }
            if acc.label.contains('|') {
                return Err(Error::Config(format!(
                    "account label {} must not contain '|'",
                    acc.label
                )));
            }
            if !seen.insert(acc.label.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate account label: {}",
                    acc.label
                )));
            }
        }
        Ok(Self { list })
    }

    pub fn by_label(&self, label: &str) -> Option<&Account> {
        self.list.iter().find(|a| a.label == label)
    }

    pub fn is_label(&self, source: &str) -> bool {
        self.by_label(source).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Account> {
        self.list.iter()
    }

    pub fn as_slice(&self) -> &[Account] {
        &self.list
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }
}

/// Load accounts from a JSON array file and interpolate `${ENV_VAR}` placeholders, so
/// tokens can stay out of the file itself.
///
/// If the file does not exist, returns an empty set.
pub fn load_accounts(path: &Path) -> Result<Accounts> {
    if !path.exists() {
        return Ok(Accounts::default());
    }

    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    let interpolated = interpolate_env(value);
    let list: Vec<Account> = serde_json::from_value(interpolated)?;
    Accounts::new(list)
}

/// Recursively interpolate `${VAR}` placeholders in all JSON strings.
fn interpolate_env(v: serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::String(s) => serde_json::Value::String(interpolate_env_str(&s)),
        serde_json::Value::Array(xs) => {
            serde_json::Value::Array(xs.into_iter().map(interpolate_env).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, interpolate_env(v)))
                .collect(),
        ),
        other => other,
    }
}

fn interpolate_env_str(s: &str) -> String {
    // Minimal `${VAR}` expansion (no defaults). Unset vars become empty string.
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + 2 + end];
        out.push_str(&env::var(name).unwrap_or_default());
        rest = &rest[start + 2 + end + 1..];
    }

    out.push_str(rest);
    out
}
