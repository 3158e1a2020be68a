use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::store::SessionStore;
use crate::timers::InactivityTimers;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepPolicy {
    pub interval: Duration,
    pub idle_threshold: Duration,
}

impl Default for SweepPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(60), idle_threshold: Duration::from_secs(3_600) }
    }
}

/// Periodically evicts idle sessions and drops their pending inactivity timers.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    timers: Arc<InactivityTimers>,
    policy: SweepPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let threshold = match chrono::Duration::from_std(policy.idle_threshold) {
            Ok(threshold) => threshold,
            Err(error) => {
                warn!(
                    event_name = "sessions.sweeper.invalid_threshold",
                    error = %error,
                    "idle threshold out of range; sweeper not started"
                );
                return;
            }
        };

        let mut ticker = tokio::time::interval(policy.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let evicted = store.evict_idle(Utc::now(), threshold).await;
            if evicted.is_empty() {
                continue;
            }
            for customer_id in &evicted {
                timers.cancel(customer_id).await;
            }
            let remaining = store.len().await;
            info!(
                event_name = "sessions.sweep.evicted",
                evicted = evicted.len(),
                remaining,
                "idle sessions evicted"
            );
        }
    })
}
