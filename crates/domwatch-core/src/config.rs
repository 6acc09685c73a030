use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    accounts::{load_accounts, Accounts},
    domain::ChatId,
    errors::Error,
    Result,
};

/// Typed, immutable process configuration.
///
/// Built once at startup and shared as `Arc<Config>`; components never read the
/// environment themselves.
#[derive(Clone, Debug)]
pub struct Config {
    // Telegram
    pub telegram_bot_token: String,
    pub alert_chat_id: ChatId,
    pub telegram_allowed_users: Vec<i64>,

    // Domain sources
    pub accounts: Accounts,
    pub domain_files: Vec<PathBuf>,

    // Expiry check
    pub alert_window: Duration,
    pub check_hour: u32,
    pub check_minute: u32,
    pub check_on_startup: bool,
    pub whois_rate_limit: Duration,
    pub whois_timeout: Duration,
    pub provider_timeout: Duration,

    // Alert dispatch
    pub queue_file: PathBuf,
    pub queue_poll_interval: Duration,
    pub dispatch_cooldown: Duration,
    pub alert_message_delay: Duration,
    pub auto_delete: bool,

    // Actions
    pub max_concurrent_actions: usize,

    // Audit
    pub audit_log_path: PathBuf,
    pub audit_log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let alert_chat_id = env_str("TELEGRAM_CHAT_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(ChatId)
            .ok_or_else(|| {
                Error::Config("TELEGRAM_CHAT_ID environment variable is required".to_string())
            })?;
        let telegram_allowed_users = parse_csv_i64(env_str("TELEGRAM_ALLOWED_USERS"));

        let accounts_file =
            PathBuf::from(env_str("ACCOUNTS_FILE").unwrap_or("accounts.json".to_string()));
        let accounts = load_accounts(&accounts_file)?;
        let domain_files = parse_csv_paths(env_str("DOMAIN_FILES"));

        let alert_days = env_u64("ALERT_DAYS").unwrap_or(7);
        let check_hour = env_u32("CHECK_HOUR").unwrap_or(15);
        let check_minute = env_u32("CHECK_MINUTE").unwrap_or(0);
        let check_on_startup = env_bool("CHECK_ON_STARTUP").unwrap_or(true);
        let whois_rate_limit =
            Duration::from_millis(env_u64("WHOIS_RATE_LIMIT_MS").unwrap_or(1000));
        let whois_timeout = Duration::from_secs(env_u64("WHOIS_TIMEOUT_SECS").unwrap_or(15));
        let provider_timeout =
            Duration::from_secs(env_u64("PROVIDER_TIMEOUT_SECS").unwrap_or(30));

        let queue_file =
            PathBuf::from(env_str("QUEUE_FILE").unwrap_or("expiring_domains.txt".to_string()));
        let queue_poll_interval = Duration::from_secs(env_u64("QUEUE_POLL_SECS").unwrap_or(30));
        let dispatch_cooldown =
            Duration::from_secs(env_u64("DISPATCH_COOLDOWN_SECS").unwrap_or(60));
        let alert_message_delay =
            Duration::from_millis(env_u64("ALERT_MESSAGE_DELAY_MS").unwrap_or(3000));
        let auto_delete = env_bool("AUTO_DELETE").unwrap_or(true);

        let max_concurrent_actions = env_usize("MAX_CONCURRENT_ACTIONS").unwrap_or(8).max(1);

        let audit_log_path = PathBuf::from(
            env_str("AUDIT_LOG_PATH").unwrap_or("/tmp/domwatch-audit.log".to_string()),
        );
        let audit_log_json = env_bool("AUDIT_LOG_JSON").unwrap_or(false);

        let cfg = Self {
            telegram_bot_token,
            alert_chat_id,
            telegram_allowed_users,
            accounts,
            domain_files,
            alert_window: Duration::from_secs(alert_days * 24 * 3600),
            check_hour,
            check_minute,
            check_on_startup,
            whois_rate_limit,
            whois_timeout,
            provider_timeout,
            queue_file,
            queue_poll_interval,
            dispatch_cooldown,
            alert_message_delay,
            auto_delete,
            max_concurrent_actions,
            audit_log_path,
            audit_log_json,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Cross-field checks. Account labels and inventory paths share the queue's `source`
    /// column, so they must never collide.
    pub fn validate(&self) -> Result<()> {
        if self.check_hour > 23 || self.check_minute > 59 {
            return Err(Error::Config(format!(
                "invalid daily check time {:02}:{:02}",
                self.check_hour, self.check_minute
            )));
        }

        for path in &self.domain_files {
            let shown = path.to_string_lossy();
            if self.accounts.is_label(&shown) {
                return Err(Error::Config(format!(
                    "domain file {shown} collides with an account label"
                )));
            }
            if shown.contains('|') {
                return Err(Error::Config(format!(
                    "domain file {shown} must not contain '|'"
                )));
            }
        }

        Ok(())
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| {
        matches!(
            s.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn parse_csv_paths(v: Option<String>) -> Vec<PathBuf> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}
