//! Turns inbound chat messages into ledger calls and replies.
//!
//! Each message is handled on its own: failures are logged and end that
//! invocation only. The only user-visible errors are usage messages.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::{
    command::{Command, Direction, Entry, HELP_TEXT, PONG},
    domain::{ChatId, UserId},
    formatting::{format_balance, format_record_list, random_compliment, split_text_chunks},
    ledger::{LedgerStore, NewRecord, RECENT_LIMIT},
    messaging::{port::MessagingPort, types::IncomingMessage},
    Result,
};

pub struct CommandDispatcher {
    ledger: Arc<dyn LedgerStore>,
    messenger: Arc<dyn MessagingPort>,
    /// The bot's own id; its messages are never handled.
    self_id: UserId,
}

impl CommandDispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        messenger: Arc<dyn MessagingPort>,
        self_id: UserId,
    ) -> Self {
        Self {
            ledger,
            messenger,
            self_id,
        }
    }

    pub async fn handle(&self, msg: &IncomingMessage) {
        if msg.author_id == self.self_id {
            return;
        }

        let command = Command::parse(&msg.text);
        if command == Command::Unrecognized {
            return;
        }
        debug!(
            command = command.name(),
            chat_id = msg.chat_id.0,
            author = %msg.author_id,
            "handling command"
        );

        match command {
            Command::Help => self.reply(msg.chat_id, HELP_TEXT).await,
            Command::Ping => self.reply(msg.chat_id, PONG).await,
            Command::Add(entry) => self.record(msg, entry, Direction::Credit).await,
            Command::Sub(entry) => self.record(msg, entry, Direction::Debit).await,
            Command::Check => self.check(msg.chat_id).await,
            Command::BadArgs(usage) => self.reply(msg.chat_id, usage.message()).await,
            Command::Unrecognized => {}
        }
    }

    async fn record(&self, msg: &IncomingMessage, entry: Entry, direction: Direction) {
        // An unparseable amount is recorded as zero rather than rejected.
        let amount_cents = entry.cents(direction).unwrap_or_else(|e| {
            warn!(
                raw_amount = %entry.raw_amount,
                author = %msg.author_id,
                "invalid amount, recording 0: {e}"
            );
            0
        });

        let record = NewRecord {
            description: entry.description,
            amount_cents,
            author: msg.author_id.to_string(),
        };
        let total = match self
            .with_ledger(move |ledger| ledger.append_then_total(&record))
            .await
        {
            Ok(total) => total,
            Err(e) => {
                error!(chat_id = msg.chat_id.0, "ledger append failed: {e}");
                return;
            }
        };

        let text = format!(
            "{}, you {}, your total balance is now {}",
            msg.author_name,
            random_compliment(),
            format_balance(total)
        );
        self.reply(msg.chat_id, &text).await;
    }

    async fn check(&self, chat_id: ChatId) {
        let snapshot = self
            .with_ledger(|ledger| Ok((ledger.total()?, ledger.recent(RECENT_LIMIT)?)))
            .await;
        let (total, records) = match snapshot {
            Ok(v) => v,
            Err(e) => {
                error!(chat_id = chat_id.0, "ledger read failed: {e}");
                return;
            }
        };

        self.reply(chat_id, &format!("Total Balance: {}", format_balance(total)))
            .await;
        self.reply(chat_id, &format!("Last {RECENT_LIMIT} transactions:"))
            .await;

        let limit = self.messenger.capabilities().max_message_len;
        for chunk in split_text_chunks(&format_record_list(&records), limit) {
            self.reply(chat_id, &chunk).await;
        }
    }

    async fn reply(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.messenger.send_text(chat_id, text).await {
            error!(chat_id = chat_id.0, "failed to send reply: {e}");
        }
    }

    /// Run a ledger call on the blocking pool.
    async fn with_ledger<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn LedgerStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = self.ledger.clone();
        tokio::task::spawn_blocking(move || f(ledger.as_ref())).await?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessageId, MessageRef};
    use crate::ledger::{Record, SqliteLedger};
    use crate::messaging::types::MessagingCapabilities;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const BOT: UserId = UserId(999);
    const CHAT: ChatId = ChatId(-100);

    struct FakeMessenger {
        max_message_len: usize,
        sends: Mutex<Vec<(ChatId, String)>>,
    }

    impl FakeMessenger {
        fn new() -> Self {
            Self::with_limit(4096)
        }

        fn with_limit(max_message_len: usize) -> Self {
            Self {
                max_message_len,
                sends: Mutex::new(Vec::new()),
            }
        }

        fn texts(&self) -> Vec<String> {
            self.sends
                .lock()
                .unwrap()
                .iter()
                .map(|(_, t)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                max_message_len: self.max_message_len,
            }
        }

        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<Option<MessageRef>> {
            let mut sends = self.sends.lock().unwrap();
            sends.push((chat_id, text.to_string()));
            Ok(Some(MessageRef {
                chat_id,
                message_id: MessageId(sends.len() as i32),
            }))
        }
    }

    /// Counts every ledger call before delegating to an in-memory store.
    struct CountingLedger {
        inner: SqliteLedger,
        calls: AtomicUsize,
    }

    impl CountingLedger {
        fn new() -> Self {
            Self {
                inner: SqliteLedger::open_in_memory().unwrap(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LedgerStore for CountingLedger {
        fn append(&self, record: &NewRecord) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.append(record)
        }

        fn total(&self) -> Result<i64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.total()
        }

        fn recent(&self, n: usize) -> Result<Vec<Record>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.recent(n)
        }
    }

    struct Harness {
        ledger: Arc<CountingLedger>,
        messenger: Arc<FakeMessenger>,
        dispatcher: CommandDispatcher,
    }

    fn harness_with(messenger: FakeMessenger) -> Harness {
        let ledger = Arc::new(CountingLedger::new());
        let messenger = Arc::new(messenger);
        let dispatcher = CommandDispatcher::new(ledger.clone(), messenger.clone(), BOT);
        Harness {
            ledger,
            messenger,
            dispatcher,
        }
    }

    fn harness() -> Harness {
        harness_with(FakeMessenger::new())
    }

    fn from_user(text: &str) -> IncomingMessage {
        IncomingMessage {
            chat_id: CHAT,
            author_id: UserId(7),
            author_name: "alice".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn add_records_cents_and_reports_total() {
        let h = harness();
        h.dispatcher.handle(&from_user("!add lunch 12.50")).await;

        let records = h.ledger.inner.recent(RECENT_LIMIT).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "lunch");
        assert_eq!(records[0].amount_cents, 1250);
        assert_eq!(records[0].author, "7");

        let texts = h.messenger.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].starts_with("alice, you "));
        assert!(texts[0].ends_with("your total balance is now $12.50"));
    }

    #[tokio::test]
    async fn sub_negates_amount() {
        let h = harness();
        h.dispatcher.handle(&from_user("!sub lunch 12.50")).await;

        let records = h.ledger.inner.recent(1).unwrap();
        assert_eq!(records[0].amount_cents, -1250);
        assert!(h.messenger.texts()[0].ends_with("now $-12.50"));
    }

    #[tokio::test]
    async fn running_total_matches_sum_of_commands() {
        let h = harness();
        for text in [
            "!add pay 100",
            "!sub rent 40.25",
            "!add refund 0.5",
            "!sub fee -2",
        ] {
            h.dispatcher.handle(&from_user(text)).await;
        }

        assert_eq!(h.ledger.inner.total().unwrap(), 10_000 - 4_025 + 50 + 200);
        let last = h.messenger.texts().pop().unwrap();
        assert!(last.ends_with("now $62.25"));
    }

    #[tokio::test]
    async fn missing_amount_replies_usage_without_mutation() {
        let h = harness();
        h.dispatcher.handle(&from_user("!add lunch")).await;

        assert_eq!(
            h.messenger.texts(),
            vec!["Bad args: !add <description> <amount>".to_string()]
        );
        assert_eq!(h.ledger.calls(), 0);
        assert_eq!(h.ledger.inner.total().unwrap(), 0);
    }

    #[tokio::test]
    async fn check_with_extra_args_touches_nothing() {
        let h = harness();
        h.dispatcher.handle(&from_user("!check please")).await;

        assert_eq!(h.messenger.texts(), vec!["Bad args: !check".to_string()]);
        assert_eq!(h.ledger.calls(), 0);
    }

    #[tokio::test]
    async fn non_numeric_amount_records_zero() {
        let h = harness();
        h.dispatcher.handle(&from_user("!add snacks lots")).await;

        let records = h.ledger.inner.recent(1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description, "snacks");
        assert_eq!(records[0].amount_cents, 0);
        assert!(h.messenger.texts()[0].ends_with("now $0.00"));
    }

    #[tokio::test]
    async fn oversized_amounts_record_zero_and_keep_ledger_usable() {
        let h = harness();
        for text in ["!add big inf", "!sub big 1e20", "!add big -1e20", "!add big NaN"] {
            h.dispatcher.handle(&from_user(text)).await;
        }
        h.dispatcher.handle(&from_user("!add lunch 1")).await;
        h.dispatcher.handle(&from_user("!check")).await;

        let records = h.ledger.inner.recent(RECENT_LIMIT).unwrap();
        assert_eq!(records.len(), 5);
        assert!(records[1..].iter().all(|r| r.amount_cents == 0));
        assert_eq!(h.ledger.inner.total().unwrap(), 100);

        let texts = h.messenger.texts();
        assert_eq!(texts.len(), 8);
        assert!(texts[..4].iter().all(|t| t.ends_with("now $0.00")));
        assert!(texts[4].ends_with("now $1.00"));
        assert_eq!(texts[5], "Total Balance: $1.00");
    }

    #[tokio::test]
    async fn add_and_sub_through_transactional_sqlite_store() {
        let ledger = Arc::new(SqliteLedger::open_in_memory().unwrap());
        let messenger = Arc::new(FakeMessenger::new());
        let dispatcher = CommandDispatcher::new(ledger.clone(), messenger.clone(), BOT);

        dispatcher.handle(&from_user("!add pay 30")).await;
        dispatcher.handle(&from_user("!sub lunch 12.50")).await;
        dispatcher.handle(&from_user("!add oops 1e20")).await;

        let records = ledger.recent(RECENT_LIMIT).unwrap();
        let amounts: Vec<i64> = records.iter().map(|r| r.amount_cents).collect();
        assert_eq!(amounts, vec![0, -1250, 3000]);
        assert_eq!(ledger.total().unwrap(), 1750);

        let texts = messenger.texts();
        assert_eq!(texts.len(), 3);
        assert!(texts[0].ends_with("now $30.00"));
        assert!(texts[1].ends_with("now $17.50"));
        assert!(texts[2].ends_with("now $17.50"));
    }

    #[tokio::test]
    async fn check_on_empty_ledger() {
        let h = harness();
        h.dispatcher.handle(&from_user("!check")).await;

        assert_eq!(
            h.messenger.texts(),
            vec![
                "Total Balance: $0.00".to_string(),
                "Last 10 transactions:".to_string(),
                String::new(),
            ]
        );
    }

    #[tokio::test]
    async fn check_lists_recent_records_newest_first() {
        let h = harness();
        h.dispatcher.handle(&from_user("!add pay 20")).await;
        h.dispatcher.handle(&from_user("!sub coffee 3.5")).await;
        h.dispatcher.handle(&from_user("!check")).await;

        let texts = h.messenger.texts();
        assert_eq!(texts.len(), 5);
        assert_eq!(texts[2], "Total Balance: $16.50");
        assert_eq!(texts[3], "Last 10 transactions:");

        let lines: Vec<&str> = texts[4].lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" coffee -3.50"));
        assert!(lines[1].ends_with(" pay 20.00"));
        // YYYY-MM-DD prefix
        assert_eq!(lines[0].split(' ').next().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn long_transaction_list_is_split() {
        let h = harness_with(FakeMessenger::with_limit(40));
        for i in 0..4 {
            h.dispatcher
                .handle(&from_user(&format!("!add item{i} 1")))
                .await;
        }
        h.dispatcher.handle(&from_user("!check")).await;

        let texts = h.messenger.texts();
        let list = &texts[6..];
        assert!(list.len() > 1);
        assert!(list.iter().all(|c| c.len() <= 40));
        assert_eq!(list.iter().map(|c| c.lines().count()).sum::<usize>(), 4);
    }

    #[tokio::test]
    async fn help_and_ping_reply_with_fixed_text() {
        let h = harness();
        h.dispatcher.handle(&from_user("!ping")).await;
        h.dispatcher.handle(&from_user("!help")).await;

        let texts = h.messenger.texts();
        assert_eq!(texts[0], "pong!");
        assert_eq!(texts[1], HELP_TEXT);
        assert_eq!(h.ledger.calls(), 0);
    }

    #[tokio::test]
    async fn ignores_own_messages_for_every_command() {
        let h = harness();
        for text in [
            "!help",
            "!ping",
            "!add lunch 12.50",
            "!add lunch",
            "!sub lunch 12.50",
            "!check",
            "/check",
        ] {
            let mut msg = from_user(text);
            msg.author_id = BOT;
            h.dispatcher.handle(&msg).await;
        }

        assert!(h.messenger.texts().is_empty());
        assert_eq!(h.ledger.calls(), 0);
    }

    #[tokio::test]
    async fn unrecognized_text_is_silent() {
        let h = harness();
        h.dispatcher.handle(&from_user("what is the balance?")).await;
        h.dispatcher.handle(&from_user("!balance")).await;

        assert!(h.messenger.texts().is_empty());
        assert_eq!(h.ledger.calls(), 0);
    }
}
