use std::sync::Arc;

use anyhow::Context;
use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{error, info, warn};

use budgie_core::{
    config::Config,
    dispatcher::CommandDispatcher,
    domain::UserId,
    ledger::LedgerStore,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
}

/// Authenticate, then long-poll Telegram until SIGINT/SIGTERM.
///
/// Authentication failure is returned as an error before any update is
/// handled.
pub async fn run_polling(cfg: Arc<Config>, ledger: Arc<dyn LedgerStore>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot
        .get_me()
        .await
        .context("telegram authentication failed")?;
    info!(
        username = me.user.username.as_deref().unwrap_or("?"),
        database = %cfg.database_path.display(),
        dev_mode = cfg.dev_mode,
        "budgie is now running, press CTRL-C to exit"
    );

    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState {
        dispatcher: Arc::new(CommandDispatcher::new(
            ledger,
            messenger,
            UserId(me.user.id.0 as i64),
        )),
    });

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let shutdown = dispatcher.shutdown_token();
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(name) => {
                info!("received {name}, shutting down");
                match shutdown.shutdown() {
                    Ok(done) => done.await,
                    Err(e) => warn!("dispatcher was not running: {e}"),
                }
            }
            Err(e) => error!("failed to install signal handlers: {e}"),
        }
    });

    dispatcher.dispatch().await;
    info!("telegram connection closed");

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "CTRL-C")
}
