use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::{
    sync::Mutex,
    time::{sleep, Instant},
};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{
        port::MessagingPort,
        types::{InlineKeyboard, MessagingCapabilities},
    },
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Spacing between any two outbound calls.
    pub global_min_interval: Duration,
    /// Spacing between two sends to the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40),
            per_chat_min_interval: Duration::from_millis(1050),
        }
    }
}

/// Earliest instants at which the next call may start.
#[derive(Debug)]
struct Slots {
    global: Instant,
    chats: HashMap<ChatId, Instant>,
}

/// `MessagingPort` decorator spacing outbound calls.
///
/// Alert bursts (one message per expiring domain plus task reports) all land in one chat,
/// so the per-chat spacing is what keeps the bot under Telegram's 429 threshold.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    slots: Mutex<Slots>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            slots: Mutex::new(Slots {
                global: Instant::now(),
                chats: HashMap::new(),
            }),
        }
    }

    /// Book the next free slot (global, and per chat when given) and return how long the
    /// caller has to wait for it.
    async fn reserve(&self, chat: Option<ChatId>) -> Duration {
        let now = Instant::now();
        let mut slots = self.slots.lock().await;

        let mut start = slots.global.max(now);
        if let Some(chat) = chat {
            let chat_next = slots.chats.get(&chat).copied().unwrap_or(now);
            start = start.max(chat_next);
            slots
                .chats
                .insert(chat, start + self.cfg.per_chat_min_interval);
        }
        slots.global = start + self.cfg.global_min_interval;

        start.saturating_duration_since(now)
    }

    async fn wait_turn(&self, chat: Option<ChatId>) {
        let wait = self.reserve(chat).await;
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_html(chat_id, html).await
    }

    async fn send_inline_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        self.wait_turn(Some(chat_id)).await;
        self.inner.send_inline_keyboard(chat_id, html, keyboard).await
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        // Answers are not chat messages; only the global spacing applies.
        self.wait_turn(None).await;
        self.inner.answer_callback_query(callback_id, text).await
    }
}
