//! Bounded pool for side-effecting chat actions.
//!
//! Every task ends in a [`Report`]; a reporter loop delivers reports to the alert chat.
//! A task that panics still produces a failure report.

use std::{future::Future, sync::Arc};

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::{
    domain::ChatId,
    formatting::{escape_html, split_message},
    messaging::{port::MessagingPort, types::InlineKeyboard},
    Result,
};

/// What a finished task wants said in chat.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Report {
    Text(String),
    Keyboard { text: String, keyboard: InlineKeyboard },
    /// Nothing to say (already logged).
    Silent,
}

#[derive(Clone)]
pub struct TaskPool {
    permits: Arc<Semaphore>,
    reports: mpsc::UnboundedSender<Report>,
}

impl TaskPool {
    /// Pool with at most `max_concurrent` tasks running, plus the receiving end for
    /// [`run_reporter`].
    pub fn new(max_concurrent: usize) -> (Self, mpsc::UnboundedReceiver<Report>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
                reports: tx,
            },
            rx,
        )
    }

    /// Queue `fut` on the pool. Returns immediately.
    pub fn spawn<F>(&self, name: impl Into<String>, fut: F)
    where
        F: Future<Output = Report> + Send + 'static,
    {
        let name = name.into();
        let permits = self.permits.clone();
        let reports = self.reports.clone();

        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };

            let report = match tokio::spawn(fut).await {
                Ok(report) => report,
                Err(e) if e.is_panic() => {
                    error!("[TASK] {name} panicked");
                    Report::Text(format!("❌ {} failed unexpectedly", escape_html(&name)))
                }
                Err(_) => {
                    warn!("[TASK] {name} was cancelled");
                    Report::Text(format!("❌ {} was cancelled", escape_html(&name)))
                }
            };

            if reports.send(report).is_err() {
                warn!("[TASK] reporter is gone; dropping outcome of {name}");
            }
        });
    }
}

/// Deliver task reports to `chat` until cancelled or every pool handle is dropped.
pub async fn run_reporter(
    mut reports: mpsc::UnboundedReceiver<Report>,
    messenger: Arc<dyn MessagingPort>,
    chat: ChatId,
    cancel: CancellationToken,
) {
    loop {
        let report = tokio::select! {
            _ = cancel.cancelled() => break,
            r = reports.recv() => match r {
                Some(r) => r,
                None => break,
            },
        };

        let sent = match report {
            Report::Silent => continue,
            Report::Text(text) => deliver(messenger.as_ref(), chat, &text, None).await,
            Report::Keyboard { text, keyboard } => {
                deliver(messenger.as_ref(), chat, &text, Some(keyboard)).await
            }
        };
        if let Err(e) = sent {
            error!("[TASK] failed to deliver report: {e}");
        }
    }
}

/// Send `text` in as many messages as the messenger's length limit needs. The keyboard,
/// if any, rides on the last one.
async fn deliver(
    messenger: &dyn MessagingPort,
    chat: ChatId,
    text: &str,
    keyboard: Option<InlineKeyboard>,
) -> Result<()> {
    let mut chunks = split_message(text, messenger.capabilities().max_message_len);
    let last = chunks.pop().unwrap_or_default();

    for chunk in &chunks {
        messenger.send_html(chat, chunk).await?;
    }
    match keyboard {
        Some(kb) => messenger.send_inline_keyboard(chat, &last, kb).await?,
        None => messenger.send_html(chat, &last).await?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMessenger;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn reports_reach_the_channel() {
        let (pool, mut rx) = TaskPool::new(2);
        pool.spawn("hello", async { Report::Text("hi".to_string()) });
        assert_eq!(rx.recv().await, Some(Report::Text("hi".to_string())));
    }

    #[tokio::test]
    async fn panicking_task_becomes_failure_report() {
        let (pool, mut rx) = TaskPool::new(1);
        pool.spawn("pause example.com", async {
            if true {
                panic!("boom");
            }
            Report::Silent
        });
        match rx.recv().await {
            Some(Report::Text(t)) => assert!(t.contains("pause example.com failed")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_is_bounded() {
        let (pool, mut rx) = TaskPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for i in 0..6 {
            let running = running.clone();
            let peak = peak.clone();
            pool.spawn(format!("t{i}"), async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(1)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                Report::Silent
            });
        }
        for _ in 0..6 {
            rx.recv().await;
        }
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reporter_sends_text_and_keyboards_and_skips_silent() {
        let fake = Arc::new(FakeMessenger::default());
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Report::Text("done".to_string())).unwrap();
        tx.send(Report::Silent).unwrap();
        tx.send(Report::Keyboard {
            text: "confirm?".to_string(),
            keyboard: InlineKeyboard::default(),
        })
        .unwrap();
        drop(tx);

        run_reporter(rx, fake.clone(), ChatId(-100), CancellationToken::new()).await;

        assert_eq!(fake.texts(), vec!["done".to_string()]);
        assert_eq!(fake.keyboard_sends().len(), 1);
    }

    #[tokio::test]
    async fn long_report_is_split_and_keyboard_kept_on_last_part() {
        let fake = Arc::new(FakeMessenger::default());
        let body: Vec<String> = (0..120)
            .map(|i| {
                let content = format!("v=spf1 {}", "x".repeat(60));
                format!("TXT txt{i}.example.com → {content} (proxied: off)")
            })
            .collect();
        let text = format!("📋 <b>DNS records for example.com</b>\n\n{}", body.join("\n"));
        assert!(text.chars().count() > 4096);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Report::Keyboard {
            text,
            keyboard: InlineKeyboard::default(),
        })
        .unwrap();
        drop(tx);
        run_reporter(rx, fake.clone(), ChatId(-100), CancellationToken::new()).await;

        let texts = fake.texts();
        let keyboards = fake.keyboard_sends();
        assert!(!texts.is_empty());
        assert_eq!(keyboards.len(), 1);
        assert!(texts.iter().all(|t| t.chars().count() <= 4096));
        assert!(keyboards[0].1.chars().count() <= 4096);

        let delivered: usize = texts
            .iter()
            .chain(std::iter::once(&keyboards[0].1))
            .map(|t| t.matches(" → ").count())
            .sum();
        assert_eq!(delivered, 120);
    }
}
