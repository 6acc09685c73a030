use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::info;

use domwatch_core::{
    callback::CallbackStateMachine, commands::CommandHandler, config::Config,
};

use crate::handlers;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub callbacks: CallbackStateMachine,
    pub commands: CommandHandler,
}

/// Consume updates until Ctrl-C: button presses go to the callback state machine, slash
/// commands to the console.
pub async fn run_polling(bot: Bot, state: Arc<AppState>) -> anyhow::Result<()> {
    if let Ok(me) = bot.get_me().await {
        info!("domwatch started: @{}", me.username());
    }
    info!(
        "Alert chat: {}, accounts: {}, allowed users: {}",
        state.cfg.alert_chat_id.0,
        state.cfg.accounts.len(),
        state.cfg.telegram_allowed_users.len()
    );

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
