use crate::domain::{Actor, ChatId};

/// Inbound slash command, already split into name and raw argument string.
#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub actor: Actor,
    pub name: String,
    pub args: String,
}

/// Inbound button press.
#[derive(Clone, Debug)]
pub struct CallbackQuery {
    pub chat_id: ChatId,
    pub actor: Actor,
    pub callback_id: String,
    pub data: String,
}

/// Telegram rejects callback payloads longer than this many bytes.
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// Inline keyboard laid out as rows of buttons.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub callback_data: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            callback_data: callback_data.into(),
        }
    }
}

impl InlineKeyboard {
    pub fn new(rows: Vec<Vec<InlineButton>>) -> Self {
        Self { rows }
    }

    /// All buttons side by side in one row.
    pub fn single_row(buttons: Vec<InlineButton>) -> Self {
        Self {
            rows: vec![buttons],
        }
    }

    pub fn buttons(&self) -> impl Iterator<Item = &InlineButton> {
        self.rows.iter().flatten()
    }
}

/// Limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    /// Longest text a single message may carry, in characters.
    pub max_message_len: usize,
}
