//! Port fakes and fixtures shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    accounts::{Account, Accounts},
    config::Config,
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    ports::{DnsProvider, DnsRecord, DnsRecordParams, WhoisClient, ZoneDetail, ZoneSummary},
    Result,
};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Unique path under /tmp for one test.
pub fn tmp_path(prefix: &str) -> PathBuf {
    let n = TMP_SEQ.fetch_add(1, Ordering::SeqCst);
    PathBuf::from(format!("/tmp/{prefix}-{}-{n}", std::process::id()))
}

pub fn account(label: &str) -> Account {
    Account {
        label: label.to_string(),
        api_token: format!("token-{label}"),
        account_id: format!("id-{label}"),
    }
}

/// Two accounts (`FL`, `VIP`), alert chat `-100`, and no artificial delays.
pub fn test_config() -> Config {
    Config {
        telegram_bot_token: "test-token".to_string(),
        alert_chat_id: ChatId(-100),
        telegram_allowed_users: Vec::new(),
        accounts: Accounts::new(vec![account("FL"), account("VIP")])
            .unwrap_or_default(),
        domain_files: Vec::new(),
        alert_window: Duration::from_secs(7 * 24 * 3600),
        check_hour: 15,
        check_minute: 0,
        check_on_startup: false,
        whois_rate_limit: Duration::ZERO,
        whois_timeout: Duration::from_secs(5),
        provider_timeout: Duration::from_secs(5),
        queue_file: tmp_path("domwatch-queue"),
        queue_poll_interval: Duration::ZERO,
        dispatch_cooldown: Duration::ZERO,
        alert_message_delay: Duration::ZERO,
        auto_delete: true,
        max_concurrent_actions: 4,
        audit_log_path: tmp_path("domwatch-audit"),
        audit_log_json: true,
    }
}

// ============== Messenger ==============

#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    sends: Mutex<Vec<(ChatId, String)>>,
    keyboards: Mutex<Vec<(ChatId, String, InlineKeyboard)>>,
    answered: Mutex<Vec<String>>,
}

impl FakeMessenger {
    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    /// Plain messages, in send order.
    pub fn texts(&self) -> Vec<String> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn keyboard_sends(&self) -> Vec<(ChatId, String, InlineKeyboard)> {
        self.keyboards.lock().unwrap().clone()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }

    pub fn total_sends(&self) -> usize {
        self.sends.lock().unwrap().len() + self.keyboards.lock().unwrap().len()
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: 4096,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.sends.lock().unwrap().push((chat_id, html.to_string()));
        Ok(self.alloc(chat_id))
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.keyboards
            .lock()
            .unwrap()
            .push((chat_id, html.to_string(), keyboard));
        Ok(self.alloc(chat_id))
    }

    async fn answer_callback_query(&self, callback_id: &str, _text: Option<&str>) -> Result<()> {
        self.answered.lock().unwrap().push(callback_id.to_string());
        Ok(())
    }
}

// ============== DNS provider ==============

/// In-memory provider: zones per account label, records per domain.
#[derive(Default)]
pub struct FakeProvider {
    zones: Mutex<HashMap<String, Vec<ZoneSummary>>>,
    records: Mutex<HashMap<String, Vec<DnsRecord>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
}

impl FakeProvider {
    pub fn with_zone(self, label: &str, domain: &str, status: &str, paused: bool) -> Self {
        self.zones
            .lock()
            .unwrap()
            .entry(label.to_string())
            .or_default()
            .push(ZoneSummary {
                name: domain.to_string(),
                status: status.to_string(),
                paused,
            });
        self
    }

    pub fn with_records(self, domain: &str, records: Vec<DnsRecord>) -> Self {
        self.records
            .lock()
            .unwrap()
            .insert(domain.to_string(), records);
        self
    }

    /// Every call for this account fails with a transport error.
    pub fn failing(self, label: &str) -> Self {
        self.failing.lock().unwrap().insert(label.to_string());
        self
    }

    pub fn slow(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = delay;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    async fn enter(&self, account: &Account, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&account.label) {
            return Err(Error::Transport(format!("{} unreachable", account.label)));
        }
        Ok(())
    }

    fn find_zone(&self, account: &Account, domain: &str) -> Result<ZoneSummary> {
        self.zones
            .lock()
            .unwrap()
            .get(&account.label)
            .and_then(|zs| zs.iter().find(|z| z.name == domain).cloned())
            .ok_or_else(|| Error::zone_not_found(domain))
    }

    fn detail(account: &Account, zone: &ZoneSummary) -> ZoneDetail {
        ZoneDetail {
            id: format!("zone-{}", zone.name),
            name: zone.name.clone(),
            name_servers: vec![
                format!("ada.{}.ns.test", account.label.to_lowercase()),
                format!("bob.{}.ns.test", account.label.to_lowercase()),
            ],
            status: zone.status.clone(),
            paused: zone.paused,
        }
    }
}

#[async_trait]
impl DnsProvider for FakeProvider {
    async fn fetch_domains(&self, account: &Account) -> Result<Vec<ZoneSummary>> {
        self.enter(account, format!("fetch {}", account.label)).await?;
        Ok(self
            .zones
            .lock()
            .unwrap()
            .get(&account.label)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_dns_records(&self, account: &Account, domain: &str) -> Result<Vec<DnsRecord>> {
        self.enter(account, format!("list {} {domain}", account.label))
            .await?;
        self.find_zone(account, domain)?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_default())
    }

    async fn pause_zone(&self, account: &Account, domain: &str, pause: bool) -> Result<()> {
        self.enter(account, format!("pause {} {domain} {pause}", account.label))
            .await?;
        self.find_zone(account, domain)?;
        if let Some(zs) = self.zones.lock().unwrap().get_mut(&account.label) {
            for z in zs.iter_mut().filter(|z| z.name == domain) {
                z.paused = pause;
            }
        }
        Ok(())
    }

    async fn delete_zone(&self, account: &Account, domain: &str) -> Result<()> {
        self.enter(account, format!("delete {} {domain}", account.label))
            .await?;
        self.find_zone(account, domain)?;
        if let Some(zs) = self.zones.lock().unwrap().get_mut(&account.label) {
            zs.retain(|z| z.name != domain);
        }
        Ok(())
    }

    async fn zone_details(&self, account: &Account, domain: &str) -> Result<ZoneDetail> {
        self.enter(account, format!("details {} {domain}", account.label))
            .await?;
        let zone = self.find_zone(account, domain)?;
        Ok(Self::detail(account, &zone))
    }

    async fn create_zone(&self, account: &Account, domain: &str) -> Result<ZoneDetail> {
        self.enter(account, format!("create {} {domain}", account.label))
            .await?;
        let zone = ZoneSummary {
            name: domain.to_string(),
            status: "pending".to_string(),
            paused: false,
        };
        self.zones
            .lock()
            .unwrap()
            .entry(account.label.clone())
            .or_default()
            .push(zone.clone());
        Ok(Self::detail(account, &zone))
    }

    async fn upsert_dns_record(
        &self,
        account: &Account,
        domain: &str,
        params: DnsRecordParams,
    ) -> Result<DnsRecord> {
        self.enter(
            account,
            format!(
                "upsert {} {domain} {} {} {}",
                account.label, params.record_type, params.name, params.content
            ),
        )
        .await?;
        self.find_zone(account, domain)?;

        let record = DnsRecord {
            id: format!("rec-{}", params.name),
            record_type: params.record_type,
            name: params.name,
            content: params.content,
            proxied: Some(params.proxied),
            ttl: params.ttl.max(1),
        };
        let mut records = self.records.lock().unwrap();
        let list = records.entry(domain.to_string()).or_default();
        list.retain(|r| !(r.record_type == record.record_type && r.name == record.name));
        list.push(record.clone());
        Ok(record)
    }
}

// ============== WHOIS ==============

#[derive(Default)]
pub struct FakeWhois {
    answers: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    slow: Mutex<HashSet<String>>,
    queries: Mutex<Vec<String>>,
}

impl FakeWhois {
    pub fn answer(self, domain: &str, text: &str) -> Self {
        self.answers
            .lock()
            .unwrap()
            .insert(domain.to_string(), text.to_string());
        self
    }

    pub fn failing(self, domain: &str) -> Self {
        self.failing.lock().unwrap().insert(domain.to_string());
        self
    }

    /// Queries for this domain never complete.
    pub fn hanging(self, domain: &str) -> Self {
        self.slow.lock().unwrap().insert(domain.to_string());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WhoisClient for FakeWhois {
    async fn query(&self, domain: &str) -> Result<String> {
        self.queries.lock().unwrap().push(domain.to_string());
        let hang = self.slow.lock().unwrap().contains(domain);
        if hang {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().unwrap().contains(domain) {
            return Err(Error::Transport(format!("whois server refused {domain}")));
        }
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .unwrap_or_else(|| format!("No match for \"{domain}\".")))
    }
}
