use crate::domain::{Actor, ChatId};

/// Whether `user` may press buttons or run console commands.
///
/// An empty allow-list means anyone in the alert chat; chat membership is the gate.
pub fn is_authorized(actor: &Actor, allowed_users: &[i64]) -> bool {
    allowed_users.is_empty() || allowed_users.contains(&actor.user_id.0)
}

/// Updates from any chat other than the alert chat are ignored.
pub fn is_alert_chat(chat_id: ChatId, alert_chat: ChatId) -> bool {
    chat_id == alert_chat
}
