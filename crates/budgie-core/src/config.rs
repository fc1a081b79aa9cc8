use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::{errors::Error, Result};

const DEFAULT_DB_PATH: &str = "./budgie.db";

/// Values supplied on the command line. They take precedence over the
/// environment.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub bot_token: Option<String>,
    /// Set only by the `-d` flag; the environment never enables it.
    pub dev_mode: bool,
}

/// Typed configuration for the bot.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,
    /// Drop and recreate the ledger table on startup.
    pub dev_mode: bool,
    pub database_path: PathBuf,
}

impl Config {
    pub fn load(overrides: Overrides) -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_parts(
            overrides,
            env_str("TELEGRAM_BOT_TOKEN"),
            env_path("BUDGIE_DB_PATH"),
        )
    }

    fn from_parts(
        overrides: Overrides,
        env_token: Option<String>,
        env_db: Option<PathBuf>,
    ) -> Result<Self> {
        let telegram_bot_token = overrides
            .bot_token
            .and_then(non_empty)
            .or_else(|| env_token.and_then(non_empty))
            .ok_or_else(|| {
                Error::Config(
                    "bot token is required (pass -t <token> or set TELEGRAM_BOT_TOKEN)"
                        .to_string(),
                )
            })?;

        let dev_mode = overrides.dev_mode;
        let database_path = env_db.unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        Ok(Self {
            telegram_bot_token: telegram_bot_token.trim().to_string(),
            dev_mode,
            database_path,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
