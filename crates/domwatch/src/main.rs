use std::sync::Arc;

use teloxide::Bot;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use domwatch_cloudflare::CloudflareProvider;
use domwatch_core::{
    callback::CallbackStateMachine,
    checker::ExpiryChecker,
    commands::CommandHandler,
    config::Config,
    dispatcher::AlertDispatcher,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::{DnsProvider, WhoisClient},
    queue::FileQueue,
    scheduler::schedule_daily_at,
    tasks::{run_reporter, TaskPool},
    utils::AuditLogger,
};
use domwatch_telegram::{router::AppState, TelegramMessenger};
use domwatch_whois::RegistrationLookup;

const CHECK_NOTICE: &str = "🔎 Starting domain expiry check…";

#[tokio::main]
async fn main() -> Result<(), domwatch_core::Error> {
    domwatch_core::logging::init("domwatch")?;

    let cfg = Arc::new(Config::load()?);
    if cfg.accounts.is_empty() && cfg.domain_files.is_empty() {
        warn!("No accounts and no domain files configured; nothing will be checked");
    }

    let provider: Arc<dyn DnsProvider> = Arc::new(CloudflareProvider::new(cfg.provider_timeout)?);
    let whois: Arc<dyn WhoisClient> = Arc::new(RegistrationLookup::new(cfg.whois_timeout)?);

    let bot = Bot::new(cfg.telegram_bot_token.clone());
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        Arc::new(TelegramMessenger::new(bot.clone())),
        ThrottleConfig::default(),
    ));

    let cancel = CancellationToken::new();
    let (pool, reports) = TaskPool::new(cfg.max_concurrent_actions);
    let reporter = tokio::spawn(run_reporter(
        reports,
        messenger.clone(),
        cfg.alert_chat_id,
        cancel.clone(),
    ));

    let queue = Arc::new(FileQueue::new(cfg.queue_file.clone()));
    let audit = AuditLogger::new(cfg.audit_log_path.clone(), cfg.audit_log_json);

    let checker = Arc::new(ExpiryChecker::new(
        cfg.clone(),
        provider.clone(),
        whois,
        queue.clone(),
    ));
    let dispatcher = AlertDispatcher::new(
        cfg.clone(),
        provider.clone(),
        messenger.clone(),
        queue,
        pool.clone(),
        audit.clone(),
    );
    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        callbacks: CallbackStateMachine::new(
            cfg.clone(),
            provider.clone(),
            messenger.clone(),
            pool.clone(),
            audit.clone(),
        ),
        commands: CommandHandler::new(cfg.clone(), provider, pool, audit),
    });

    let scheduler = {
        let cfg = cfg.clone();
        let cancel = cancel.clone();
        let messenger = messenger.clone();
        tokio::spawn(async move {
            let run = || {
                let checker = checker.clone();
                let messenger = messenger.clone();
                let chat = cfg.alert_chat_id;
                async move {
                    if let Err(e) = messenger.send_html(chat, CHECK_NOTICE).await {
                        warn!("Failed to send check notice: {e}");
                    }
                    match checker.run_cycle().await {
                        Ok(n) => info!("Expiry check done: {n} domain(s) queued"),
                        Err(e) => error!("Expiry check failed: {e}"),
                    }
                }
            };

            if cfg.check_on_startup {
                run().await;
            }
            schedule_daily_at(cfg.check_hour, cfg.check_minute, cancel, run).await;
        })
    };

    let dispatch = {
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };

    let polled = domwatch_telegram::router::run_polling(bot, state).await;

    info!("Shutting down");
    cancel.cancel();
    let _ = tokio::join!(scheduler, dispatch, reporter);

    polled.map_err(|e| domwatch_core::Error::External(format!("telegram bot failed: {e}")))
}
