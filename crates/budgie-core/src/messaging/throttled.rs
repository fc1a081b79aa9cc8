use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, MessageRef},
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

/// Once this many chats are tracked, idle limiters are dropped before
/// adding another.
const PRUNE_AT: usize = 1024;

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound calls (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between calls per chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Telegram allows ~30 msg/sec overall and bursts of a few per chat.
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(350),
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// MessagingPort decorator that rate-limits outbound calls.
///
/// `!check` sends three messages back to back; spacing them keeps the bot
/// clear of 429 responses without reordering replies within a chat.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        if map.len() >= PRUNE_AT && !map.contains_key(&chat_id) {
            prune_idle(&mut map);
        }
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

/// Drop limiters whose next slot has passed: a fresh one behaves the same.
/// Limiters that are locked or still shared are kept.
fn prune_idle(map: &mut HashMap<i64, Arc<Mutex<IntervalLimiter>>>) {
    let now = Instant::now();
    map.retain(|_, lim| {
        if Arc::strong_count(lim) > 1 {
            return true;
        }
        match lim.try_lock() {
            Ok(guard) => guard.next > now,
            Err(_) => true,
        }
    });
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<Option<MessageRef>> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_text(chat_id, text).await
    }
}
