use std::sync::Arc;

use teloxide::prelude::*;

use domwatch_core::{
    domain::ChatId,
    messaging::types::CallbackQuery as CoreCallbackQuery,
};

use super::actor_of;
use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let data = q.data.clone().unwrap_or_default();

    // Always answer; presses without a message or payload have nothing to run.
    let Some(message) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    };
    if data.is_empty() {
        let _ = bot.answer_callback_query(q.id.clone()).await;
        return Ok(());
    }

    let query = CoreCallbackQuery {
        chat_id: ChatId(message.chat.id.0),
        actor: actor_of(&q.from),
        callback_id: q.id.clone(),
        data,
    };

    state.callbacks.handle(query).await;
    Ok(())
}
