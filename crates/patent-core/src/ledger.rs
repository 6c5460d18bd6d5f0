use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[cfg(test)]
use mockall::automock;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(2000);

#[cfg_attr(test, automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Remembers recently executed operations for a rolling window.
///
/// Keys are compared verbatim. Entries older than the window are dropped on
/// every check, which keeps the map no larger than the number of distinct
/// keys seen within one window.
pub struct DuplicateLedger {
    window: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Instant>>,
}

impl Default for DuplicateLedger {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl DuplicateLedger {
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Arc::new(SystemClock))
    }

    pub fn with_clock(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns `true` when `key` was recorded within the window. A fresh key
    /// is recorded and `false` returned. A duplicate does not refresh the
    /// original timestamp.
    pub fn check_and_record(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.retain(|_, seen| now.saturating_duration_since(*seen) <= self.window);

        if entries.contains_key(key) {
            return true;
        }
        entries.insert(key.to_string(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A mock clock whose reading is `start + offset`, with the offset shared
/// so tests can move time forward.
#[cfg(test)]
pub(crate) fn stepped_clock() -> (Arc<MockClock>, Arc<Mutex<Duration>>) {
    let start = Instant::now();
    let offset = Arc::new(Mutex::new(Duration::ZERO));
    let reading = offset.clone();
    let mut clock = MockClock::new();
    clock
        .expect_now()
        .returning(move || start + *reading.lock().unwrap());
    (Arc::new(clock), offset)
}
