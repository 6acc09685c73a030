//! Button-press handling: pause/unpause, DNS listing, and the two-step delete.
//!
//! Tokens are self-describing (`action|label|domain[|extra]`); nothing is stored between
//! the alert and the click. A `delete` token only ever yields a confirmation prompt; the
//! provider delete runs solely for a `delete_confirm` token minted by that prompt.

use std::{fmt, sync::Arc};

use tracing::{info, warn};

use crate::{
    config::Config,
    domain::{normalize_domain, Actor},
    errors::Error,
    formatting::{escape_html, format_record_list},
    messaging::{
        port::MessagingPort,
        types::{CallbackQuery, InlineButton, InlineKeyboard, MAX_CALLBACK_DATA_LEN},
    },
    ports::DnsProvider,
    security::{is_alert_chat, is_authorized},
    tasks::{Report, TaskPool},
    utils::{with_deadline, AuditEvent, AuditLogger},
    Result,
};

const SEP: char = '|';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackToken {
    Pause {
        label: String,
        domain: String,
        pause: bool,
    },
    Dns {
        label: String,
        domain: String,
    },
    Delete {
        label: String,
        domain: String,
    },
    DeleteConfirm {
        label: String,
        domain: String,
    },
    DeleteCancel {
        label: String,
        domain: String,
    },
}

impl CallbackToken {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Pause { .. } => "pause",
            Self::Dns { .. } => "DNS",
            Self::Delete { .. } => "delete",
            Self::DeleteConfirm { .. } => "delete_confirm",
            Self::DeleteCancel { .. } => "delete_cancel",
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Pause { label, .. }
            | Self::Dns { label, .. }
            | Self::Delete { label, .. }
            | Self::DeleteConfirm { label, .. }
            | Self::DeleteCancel { label, .. } => label,
        }
    }

    pub fn domain(&self) -> &str {
        match self {
            Self::Pause { domain, .. }
            | Self::Dns { domain, .. }
            | Self::Delete { domain, .. }
            | Self::DeleteConfirm { domain, .. }
            | Self::DeleteCancel { domain, .. } => domain,
        }
    }

    pub fn encode(&self) -> String {
        let base = format!("{}{SEP}{}{SEP}{}", self.action(), self.label(), self.domain());
        match self {
            Self::Pause { pause, .. } => {
                format!("{base}{SEP}{}", if *pause { "yes" } else { "no" })
            }
            _ => base,
        }
    }

    pub fn parse(data: &str) -> Result<Self> {
        let parts: Vec<&str> = data.split(SEP).collect();
        let bad = |why: &str| Error::Malformed(format!("callback {data:?}: {why}"));

        let (action, label, domain, extra) = match parts.as_slice() {
            [a, l, d] => (*a, *l, *d, None),
            [a, l, d, x] => (*a, *l, *d, Some(*x)),
            _ => return Err(bad("expected 3 or 4 fields")),
        };
        if label.is_empty() || domain.trim().is_empty() {
            return Err(bad("empty account or domain"));
        }
        let label = label.to_string();
        let domain = normalize_domain(domain);

        match (action, extra) {
            ("pause", Some("yes")) => Ok(Self::Pause {
                label,
                domain,
                pause: true,
            }),
            ("pause", Some("no")) => Ok(Self::Pause {
                label,
                domain,
                pause: false,
            }),
            ("pause", _) => Err(bad("pause needs yes or no")),
            (_, Some(_)) => Err(bad("unexpected extra field")),
            ("DNS", None) => Ok(Self::Dns { label, domain }),
            ("delete", None) => Ok(Self::Delete { label, domain }),
            ("delete_confirm", None) => Ok(Self::DeleteConfirm { label, domain }),
            ("delete_cancel", None) => Ok(Self::DeleteCancel { label, domain }),
            (other, None) => Err(bad(&format!("unknown action {other:?}"))),
        }
    }

    /// Telegram drops buttons whose payload exceeds 64 bytes.
    pub fn fits_callback_limit(&self) -> bool {
        self.encode().len() <= MAX_CALLBACK_DATA_LEN
    }

    pub fn button(&self, label: &str) -> InlineButton {
        InlineButton::new(label, self.encode())
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Alert keyboard for a hosted zone: pause, unpause, list DNS.
pub fn alert_keyboard(label: &str, domain: &str) -> Option<InlineKeyboard> {
    let tokens = [
        (
            "⏸ Pause zone",
            CallbackToken::Pause {
                label: label.to_string(),
                domain: domain.to_string(),
                pause: true,
            },
        ),
        (
            "▶️ Unpause zone",
            CallbackToken::Pause {
                label: label.to_string(),
                domain: domain.to_string(),
                pause: false,
            },
        ),
        (
            "📋 DNS records",
            CallbackToken::Dns {
                label: label.to_string(),
                domain: domain.to_string(),
            },
        ),
    ];
    if !tokens.iter().all(|(_, t)| t.fits_callback_limit()) {
        return None;
    }
    Some(InlineKeyboard::single_row(
        tokens.iter().map(|(text, t)| t.button(text)).collect(),
    ))
}

#[derive(Clone)]
pub struct CallbackStateMachine {
    inner: Arc<Inner>,
}

struct Inner {
    cfg: Arc<Config>,
    provider: Arc<dyn DnsProvider>,
    messenger: Arc<dyn MessagingPort>,
    pool: TaskPool,
    audit: AuditLogger,
}

impl CallbackStateMachine {
    pub fn new(
        cfg: Arc<Config>,
        provider: Arc<dyn DnsProvider>,
        messenger: Arc<dyn MessagingPort>,
        pool: TaskPool,
        audit: AuditLogger,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cfg,
                provider,
                messenger,
                pool,
                audit,
            }),
        }
    }

    /// Entry point for the update router. Answers the query, then hands the work to the
    /// task pool and returns without waiting for the provider.
    pub async fn handle(&self, query: CallbackQuery) {
        let inner = &self.inner;
        let ack = self.accept(&query);

        if let Err(e) = inner
            .messenger
            .answer_callback_query(&query.callback_id, ack.as_ref().err().map(|s| s.as_str()))
            .await
        {
            warn!("[CALLBACK] failed to answer {}: {e}", query.callback_id);
        }

        let Ok(token) = ack else {
            return;
        };

        info!(
            "[CALLBACK] {} from {}",
            token.encode(),
            query.actor.display_name()
        );
        let this = self.clone();
        let actor = query.actor;
        inner.pool.spawn(format!("{} {}", token.action(), token.domain()), async move {
            this.execute(token, actor).await
        });
    }

    /// Gate and parse. The error string is shown to the user as the callback answer.
    fn accept(&self, query: &CallbackQuery) -> std::result::Result<CallbackToken, String> {
        let cfg = &self.inner.cfg;
        if !is_alert_chat(query.chat_id, cfg.alert_chat_id) {
            warn!("[CALLBACK] ignoring press from chat {}", query.chat_id.0);
            return Err("Not available here".to_string());
        }
        if !is_authorized(&query.actor, &cfg.telegram_allowed_users) {
            warn!(
                "[CALLBACK] unauthorized press by {}",
                query.actor.display_name()
            );
            return Err("Not authorized".to_string());
        }
        CallbackToken::parse(&query.data).map_err(|e| {
            warn!("[CALLBACK] {e}");
            "Unknown action".to_string()
        })
    }

    /// Run one action to completion and describe the outcome.
    pub async fn execute(&self, token: CallbackToken, actor: Actor) -> Report {
        let inner = &self.inner;
        let Some(account) = inner.cfg.accounts.by_label(token.label()) else {
            warn!(
                "[CALLBACK] unknown account {:?} in {}",
                token.label(),
                token.encode()
            );
            return Report::Silent;
        };
        let who = escape_html(&actor.display_name());
        let domain_html = escape_html(token.domain());
        let label_html = escape_html(token.label());

        match &token {
            CallbackToken::Pause { domain, pause, .. } => {
                let verb = if *pause { "paused" } else { "unpaused" };
                let res = self
                    .provider_call(
                        format!("pause {domain}"),
                        inner.provider.pause_zone(account, domain, *pause),
                    )
                    .await;
                self.audit(&actor, &token, &res);
                match res {
                    Ok(()) => Report::Text(format!(
                        "✅ {domain_html} ({label_html}) {verb} by {who}"
                    )),
                    Err(e) => Report::Text(format!(
                        "❌ Could not set {domain_html} ({label_html}) {verb}: {} \
                         (requested by {who})",
                        escape_html(&e.to_string())
                    )),
                }
            }
            CallbackToken::Dns { domain, .. } => {
                let res = self
                    .provider_call(
                        format!("list records {domain}"),
                        inner.provider.list_dns_records(account, domain),
                    )
                    .await;
                match res {
                    Ok(records) => {
                        let text = format_record_list(domain, &records);
                        let delete = CallbackToken::Delete {
                            label: account.label.clone(),
                            domain: domain.clone(),
                        };
                        if delete.fits_callback_limit() {
                            Report::Keyboard {
                                text,
                                keyboard: InlineKeyboard::single_row(vec![
                                    delete.button("🗑 Delete zone")
                                ]),
                            }
                        } else {
                            Report::Text(text)
                        }
                    }
                    Err(e) => Report::Text(format!(
                        "❌ Could not list DNS records for {domain_html} ({label_html}): {}",
                        escape_html(&e.to_string())
                    )),
                }
            }
            CallbackToken::Delete { domain, .. } => {
                let confirm = CallbackToken::DeleteConfirm {
                    label: account.label.clone(),
                    domain: domain.clone(),
                };
                let cancel = CallbackToken::DeleteCancel {
                    label: account.label.clone(),
                    domain: domain.clone(),
                };
                Report::Keyboard {
                    text: format!(
                        "⚠️ <b>Confirm zone deletion</b>\n\nRequested by: {who}\n\
                         Domain: {domain_html}\nAccount: {label_html}\n\nThis cannot be undone."
                    ),
                    keyboard: InlineKeyboard::single_row(vec![
                        confirm.button("✅ Delete"),
                        cancel.button("❌ Cancel"),
                    ]),
                }
            }
            CallbackToken::DeleteConfirm { domain, .. } => {
                let res = self
                    .provider_call(
                        format!("delete {domain}"),
                        inner.provider.delete_zone(account, domain),
                    )
                    .await;
                self.audit(&actor, &token, &res);
                match res {
                    Ok(()) => Report::Text(format!(
                        "✅ Zone {domain_html} deleted from {label_html} by {who}"
                    )),
                    Err(e) => Report::Text(format!(
                        "❌ Could not delete {domain_html} from {label_html}: {} \
                         (requested by {who})",
                        escape_html(&e.to_string())
                    )),
                }
            }
            CallbackToken::DeleteCancel { .. } => {
                self.audit(&actor, &token, &Ok(()));
                Report::Text(format!(
                    "Deletion of {domain_html} ({label_html}) cancelled by {who}"
                ))
            }
        }
    }

    async fn provider_call<T>(
        &self,
        op: String,
        fut: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        with_deadline(op, self.inner.cfg.provider_timeout, fut).await
    }

    fn audit<T>(&self, actor: &Actor, token: &CallbackToken, res: &Result<T>) {
        let err = res.as_ref().err().map(|e| e.to_string());
        self.inner.audit.record(AuditEvent::action(
            actor,
            token.action(),
            Some(token.label()),
            Some(token.domain()),
            match &err {
                Some(e) => Err(e.as_str()),
                None => Ok(()),
            },
        ));
    }
}
