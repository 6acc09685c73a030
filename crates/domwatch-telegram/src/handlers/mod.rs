//! Inbound update handlers.
//!
//! Each one converts the teloxide update into a core type and hands it to the core
//! handler, which owns gating, auditing and reporting.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{CallbackQuery, Message, User},
};

use domwatch_core::domain::{Actor, UserId};

use crate::router::AppState;

mod callback;
mod commands;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    callback::handle_callback(bot, q, state).await
}

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.starts_with('/') {
        return Ok(());
    }
    commands::handle_command(&msg, text, state).await
}

fn actor_of(user: &User) -> Actor {
    Actor {
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
    }
}
