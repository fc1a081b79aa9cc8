use std::sync::Arc;

use clap::Parser;

use budgie_core::{
    config::{Config, Overrides},
    ledger::{LedgerStore, SqliteLedger},
};

/// Shared running-balance ledger bot.
#[derive(Debug, Parser)]
#[command(name = "budgie", version)]
struct Cli {
    /// Dev mode: drop all ledger records on startup
    #[arg(short = 'd', long = "dev")]
    dev: bool,

    /// Bot token
    #[arg(short = 't', long = "token", default_value = "")]
    token: String,
}

#[tokio::main]
async fn main() -> Result<(), budgie_core::Error> {
    let cli = Cli::parse();
    budgie_core::logging::init("budgie")?;

    let cfg = Arc::new(Config::load(Overrides {
        bot_token: Some(cli.token),
        dev_mode: cli.dev,
    })?);

    let ledger: Arc<dyn LedgerStore> =
        Arc::new(SqliteLedger::open(&cfg.database_path, cfg.dev_mode)?);
    tracing::info!(path = %cfg.database_path.display(), "ledger opened");

    budgie_telegram::router::run_polling(cfg, ledger)
        .await
        .map_err(|e| budgie_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    Ok(())
}
