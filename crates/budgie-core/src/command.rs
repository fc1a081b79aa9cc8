//! Chat command classification.
//!
//! Every inbound text is classified exactly once into a [`Command`]; the
//! dispatcher then matches on the variant.

use std::num::ParseFloatError;

/// Largest magnitude accepted for a single entry ($100 billion).
///
/// Keeps `SUM(cents)` far from `i64` overflow, which would otherwise wedge
/// every later total since records can't be removed.
pub const MAX_ENTRY_CENTS: i64 = 10_000_000_000_000;

pub const HELP_TEXT: &str = "ping - test connection
add - add money
sub - subtract money
check - show balance and last 10 transactions
help - this text
";

pub const PONG: &str = "pong!";

/// Usage message sent back when a command has the wrong argument count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Usage {
    Add,
    Sub,
    Check,
}

impl Usage {
    pub fn message(self) -> &'static str {
        match self {
            Usage::Add => "Bad args: !add <description> <amount>",
            Usage::Sub => "Bad args: !sub <description> <amount>",
            Usage::Check => "Bad args: !check",
        }
    }
}

/// Whether an entry adds to or subtracts from the balance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("not a number: {0}")]
    NotANumber(#[from] ParseFloatError),

    #[error("amount out of range: {0}")]
    OutOfRange(String),
}

/// Arguments of `!add` / `!sub`, amount still unparsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub description: String,
    pub raw_amount: String,
}

impl Entry {
    /// Amount in cents: the typed number times 100 (or -100 for a debit),
    /// truncated toward zero. A debit negates whatever sign was typed.
    /// Non-finite values and magnitudes above [`MAX_ENTRY_CENTS`] are errors.
    pub fn cents(&self, direction: Direction) -> Result<i64, AmountError> {
        let amount: f64 = self.raw_amount.parse()?;
        let factor = match direction {
            Direction::Credit => 100.0,
            Direction::Debit => -100.0,
        };
        let scaled = (amount * factor).trunc();
        if !scaled.is_finite() || scaled.abs() > MAX_ENTRY_CENTS as f64 {
            return Err(AmountError::OutOfRange(self.raw_amount.clone()));
        }
        Ok(scaled as i64)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Help,
    Ping,
    Add(Entry),
    Sub(Entry),
    Check,
    BadArgs(Usage),
    Unrecognized,
}

impl Command {
    /// Classify a message by its first whitespace-delimited token.
    ///
    /// The token is matched case-sensitively. Both `!add` and the Telegram
    /// slash form (`/add`, `/add@somebot`) select the same command.
    pub fn parse(text: &str) -> Self {
        let fields: Vec<&str> = text.split_whitespace().collect();
        let Some((&head, args)) = fields.split_first() else {
            return Command::Unrecognized;
        };
        let Some(name) = command_name(head) else {
            return Command::Unrecognized;
        };

        match name {
            "help" => Command::Help,
            "ping" => Command::Ping,
            "add" => match entry(args) {
                Some(e) => Command::Add(e),
                None => Command::BadArgs(Usage::Add),
            },
            "sub" => match entry(args) {
                Some(e) => Command::Sub(e),
                None => Command::BadArgs(Usage::Sub),
            },
            "check" if args.is_empty() => Command::Check,
            "check" => Command::BadArgs(Usage::Check),
            _ => Command::Unrecognized,
        }
    }

    /// Short label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Ping => "ping",
            Command::Add(_) => "add",
            Command::Sub(_) => "sub",
            Command::Check => "check",
            Command::BadArgs(_) => "bad_args",
            Command::Unrecognized => "unrecognized",
        }
    }
}

fn command_name(token: &str) -> Option<&str> {
    if let Some(name) = token.strip_prefix('!') {
        return Some(name);
    }
    let slash = token.strip_prefix('/')?;
    // Telegram may send `/cmd@botname`
    Some(slash.split('@').next().unwrap_or(slash))
}

fn entry(args: &[&str]) -> Option<Entry> {
    match args {
        [description, amount] => Some(Entry {
            description: (*description).to_string(),
            raw_amount: (*amount).to_string(),
        }),
        _ => None,
    }
}
