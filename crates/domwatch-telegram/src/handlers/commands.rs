use std::sync::Arc;

use teloxide::prelude::*;

use domwatch_core::{domain::ChatId, messaging::types::Command};

use super::actor_of;
use crate::router::AppState;

/// Split `/cmd@botname arg1 ...` into a lowercase command name and the raw arguments.
pub(crate) fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

pub async fn handle_command(msg: &Message, text: &str, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };

    let (name, args) = parse_command(text);
    if name.is_empty() {
        return Ok(());
    }

    state.commands.handle(Command {
        chat_id: ChatId(msg.chat.id.0),
        actor: actor_of(user),
        name,
        args,
    });
    Ok(())
}
