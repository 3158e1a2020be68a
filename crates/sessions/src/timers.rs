use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use marmita_core::domain::customer::CustomerId;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

const EXPIRY_CHANNEL_CAPACITY: usize = 256;

/// Emitted when a customer's inactivity delay elapses.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerExpired {
    pub customer_id: CustomerId,
    pub generation: u64,
}

struct TimerEntry {
    generation: u64,
    task: JoinHandle<()>,
}

/// One deferred timeout per customer, rescheduled on every inbound message.
///
/// An expiry that raced with a reschedule carries a stale generation and is
/// rejected by [`InactivityTimers::claim`].
pub struct InactivityTimers {
    delay: Duration,
    expired: mpsc::Sender<TimerExpired>,
    entries: Mutex<HashMap<CustomerId, TimerEntry>>,
    next_generation: AtomicU64,
}

impl InactivityTimers {
    pub fn new(delay: Duration) -> (Self, mpsc::Receiver<TimerExpired>) {
        let (expired, receiver) = mpsc::channel(EXPIRY_CHANNEL_CAPACITY);
        let timers = Self {
            delay,
            expired,
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        };
        (timers, receiver)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub async fn reschedule(&self, customer_id: &CustomerId) -> u64 {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let sender = self.expired.clone();
        let delay = self.delay;
        let expiry = TimerExpired { customer_id: customer_id.clone(), generation };

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(expiry).await.is_err() {
                debug!(
                    event_name = "sessions.timer.receiver_closed",
                    "inactivity expiry dropped; receiver closed"
                );
            }
        });

        let previous = self
            .entries
            .lock()
            .await
            .insert(customer_id.clone(), TimerEntry { generation, task });
        if let Some(previous) = previous {
            previous.task.abort();
        }
        generation
    }

    pub async fn cancel(&self, customer_id: &CustomerId) -> bool {
        match self.entries.lock().await.remove(customer_id) {
            Some(entry) => {
                entry.task.abort();
                true
            }
            None => false,
        }
    }

    /// Consumes the pending entry if `expiry` is still the current timer for its customer.
    pub async fn claim(&self, expiry: &TimerExpired) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(&expiry.customer_id) {
            Some(entry) if entry.generation == expiry.generation => {
                entries.remove(&expiry.customer_id);
                true
            }
            _ => false,
        }
    }

    pub async fn pending(&self) -> usize {
        self.entries.lock().await.len()
    }
}
