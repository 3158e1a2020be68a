use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use marmita_core::domain::customer::CustomerId;
use marmita_core::domain::session::Session;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Holding the lock is what serializes messages for one customer.
pub type SessionHandle = Arc<Mutex<Session>>;

/// Process-wide identifier to session mapping. Nothing survives a restart.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<CustomerId, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(&self, customer_id: &CustomerId, now: DateTime<Utc>) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(customer_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(customer_id.clone())
            .or_insert_with(|| {
                debug!(
                    event_name = "sessions.created",
                    customer_id = %customer_id,
                    "session created"
                );
                Arc::new(Mutex::new(Session::new(customer_id.clone(), now)))
            })
            .clone()
    }

    /// Lookup without creation, for paths not initiated by the customer.
    pub async fn get(&self, customer_id: &CustomerId) -> Option<SessionHandle> {
        self.sessions.read().await.get(customer_id).cloned()
    }

    pub async fn reset(&self, customer_id: &CustomerId) -> bool {
        let Some(handle) = self.get(customer_id).await else {
            return false;
        };
        handle.lock().await.reset();
        true
    }

    pub async fn clear_cart_keep_flow(&self, customer_id: &CustomerId) -> bool {
        let Some(handle) = self.get(customer_id).await else {
            return false;
        };
        handle.lock().await.clear_cart_keep_flow();
        true
    }

    /// Drops every session whose last contact is older than `idle_threshold`,
    /// whatever its state. Sessions locked by an in-flight message are kept
    /// until a later sweep.
    pub async fn evict_idle(&self, now: DateTime<Utc>, idle_threshold: Duration) -> Vec<CustomerId> {
        let mut sessions = self.sessions.write().await;
        let mut evicted = Vec::new();

        sessions.retain(|customer_id, handle| {
            // A handle held outside the map belongs to a message or confirmation about to lock it.
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            let Ok(session) = handle.try_lock() else {
                return true;
            };
            let keep = session.idle_for(now) <= idle_threshold;
            if !keep {
                evicted.push(customer_id.clone());
            }
            keep
        });

        evicted
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use marmita_core::domain::cart::CartLine;
    use marmita_core::domain::customer::CustomerId;
    use marmita_core::flows::states::ConversationState;
    use rust_decimal::Decimal;

    use super::SessionStore;

    fn customer(raw: &str) -> CustomerId {
        CustomerId(raw.to_owned())
    }

    #[tokio::test]
    async fn get_or_create_returns_the_same_handle() {
        let store = SessionStore::new();
        let id = customer("5511999990000");

        let first = store.get_or_create(&id, Utc::now()).await;
        let second = store.get_or_create(&id, Utc::now()).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len().await, 1);
        assert_eq!(first.lock().await.state, ConversationState::Initial);
    }

    #[tokio::test]
    async fn get_never_creates() {
        let store = SessionStore::new();

        assert!(store.get(&customer("5511999990000")).await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn reset_and_clear_operate_on_existing_sessions() {
        let store = SessionStore::new();
        let id = customer("5511999990000");
        let handle = store.get_or_create(&id, Utc::now()).await;
        {
            let mut session = handle.lock().await;
            session.name = "Ana".to_owned();
            session.state = ConversationState::Quantity;
            session.cart.push(CartLine::new("Salada", Decimal::ONE));
        }

        assert!(store.clear_cart_keep_flow(&id).await);
        {
            let session = handle.lock().await;
            assert_eq!(session.state, ConversationState::Menu);
            assert_eq!(session.name, "Ana");
            assert!(session.cart.is_empty());
        }

        assert!(store.reset(&id).await);
        assert!(handle.lock().await.name.is_empty());
        assert!(!store.reset(&customer("5511000000000")).await);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_and_recent_ones_survive() {
        let store = SessionStore::new();
        let now = Utc::now();
        let threshold = Duration::minutes(60);

        let stale = customer("5511111111111");
        let fresh = customer("5522222222222");
        let edge = customer("5533333333333");
        store.get_or_create(&stale, now - Duration::minutes(61)).await;
        store.get_or_create(&fresh, now - Duration::minutes(5)).await;
        store.get_or_create(&edge, now - threshold).await;

        let evicted = store.evict_idle(now, threshold).await;

        assert_eq!(evicted, vec![stale.clone()]);
        assert!(store.get(&stale).await.is_none());
        assert!(store.get(&fresh).await.is_some());
        assert!(store.get(&edge).await.is_some());
    }

    #[tokio::test]
    async fn locked_sessions_are_skipped_by_the_sweep() {
        let store = SessionStore::new();
        let now = Utc::now();
        let id = customer("5511999990000");
        let handle = store.get_or_create(&id, now - Duration::hours(3)).await;

        let guard = handle.lock().await;
        assert!(store.evict_idle(now, Duration::minutes(60)).await.is_empty());
        drop(guard);
        drop(handle);

        assert_eq!(store.evict_idle(now, Duration::minutes(60)).await, vec![id]);
    }

    #[tokio::test]
    async fn handed_out_sessions_survive_the_sweep_until_released() {
        let store = SessionStore::new();
        let now = Utc::now();
        let id = customer("5511999990000");
        store.get_or_create(&id, now - Duration::hours(3)).await;

        // A message picked up the handle but has not locked it yet.
        let handle = store.get_or_create(&id, now).await;
        assert!(store.evict_idle(now, Duration::minutes(60)).await.is_empty());

        {
            let mut session = handle.lock().await;
            session.touch(now);
            session.name = "Ana".to_owned();
        }
        drop(handle);

        assert!(store.evict_idle(now, Duration::minutes(60)).await.is_empty());
        let kept = store.get(&id).await.expect("session still stored");
        assert_eq!(kept.lock().await.name, "Ana");
    }
}
