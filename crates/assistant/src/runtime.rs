use std::sync::Arc;

use chrono::{DateTime, Utc};
use marmita_core::domain::customer::CustomerId;
use marmita_core::flows::{prompts, ConversationEngine, Input, Outbound, TransitionOutcome};
use marmita_sessions::{InactivityTimers, SessionStore, TimerExpired};
use marmita_whatsapp::events::InboundMessage;
use marmita_whatsapp::outbound::Messenger;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::guardrails::{AdminDirectory, BusinessHours};

/// Tolerance between the timer clock and wall-clock contact timestamps.
const TIMER_SLACK_SECS: i64 = 5;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundDisposition {
    Processed(TransitionOutcome),
    Closed,
}

/// Inbound message path: opening-hours gate, per-customer serialization,
/// engine dispatch, reply delivery and inactivity rescheduling.
pub struct OrderAssistant {
    engine: ConversationEngine,
    store: Arc<SessionStore>,
    timers: Arc<InactivityTimers>,
    messenger: Arc<dyn Messenger>,
    hours: BusinessHours,
    admins: AdminDirectory,
}

impl OrderAssistant {
    pub fn new(
        engine: ConversationEngine,
        store: Arc<SessionStore>,
        timers: Arc<InactivityTimers>,
        messenger: Arc<dyn Messenger>,
        hours: BusinessHours,
        admins: AdminDirectory,
    ) -> Self {
        Self { engine, store, timers, messenger, hours, admins }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    pub async fn handle_inbound(
        &self,
        message: &InboundMessage,
        now: DateTime<Utc>,
    ) -> InboundDisposition {
        let customer_id = &message.customer_id;

        if !self.admins.is_admin(customer_id) && !self.hours.is_open(now) {
            info!(
                event_name = "assistant.inbound.closed",
                customer_id = %customer_id,
                "message received outside business hours"
            );
            self.send_text(customer_id, &prompts::closed(&self.hours.describe())).await;
            return InboundDisposition::Closed;
        }

        let handle = self.store.get_or_create(customer_id, now).await;
        let mut session = handle.lock().await;
        session.touch(now);
        let outcome = self.engine.handle(&mut session, &Input::message(message.text.as_str())).await;
        self.timers.reschedule(customer_id).await;
        self.dispatch(customer_id, &outcome.replies).await;
        drop(session);

        InboundDisposition::Processed(outcome)
    }

    /// Applies an inactivity expiry, unless it was superseded or the customer wrote since.
    pub async fn handle_timeout(
        &self,
        expiry: &TimerExpired,
        now: DateTime<Utc>,
    ) -> Option<TransitionOutcome> {
        if !self.timers.claim(expiry).await {
            debug!(
                event_name = "assistant.timeout.superseded",
                customer_id = %expiry.customer_id,
                generation = expiry.generation,
                "stale inactivity expiry dropped"
            );
            return None;
        }
        let handle = self.store.get(&expiry.customer_id).await?;
        let mut session = handle.lock().await;

        let delay = chrono::Duration::from_std(self.timers.delay()).ok()?;
        let slack = chrono::Duration::seconds(TIMER_SLACK_SECS);
        if session.idle_for(now) + slack < delay {
            debug!(
                event_name = "assistant.timeout.recent_contact",
                customer_id = %expiry.customer_id,
                "customer wrote after the timer was armed"
            );
            return None;
        }

        let outcome = self.engine.handle(&mut session, &Input::Timeout).await;
        self.dispatch(&expiry.customer_id, &outcome.replies).await;
        Some(outcome)
    }

    pub fn spawn_timeout_loop(
        self: Arc<Self>,
        mut expired: mpsc::Receiver<TimerExpired>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(expiry) = expired.recv().await {
                self.handle_timeout(&expiry, Utc::now()).await;
            }
            debug!(event_name = "assistant.timeout.loop_closed", "inactivity channel closed");
        })
    }

    async fn dispatch(&self, customer_id: &CustomerId, replies: &[Outbound]) {
        for reply in replies {
            match reply {
                Outbound::Customer(text) => self.send_text(customer_id, text).await,
                Outbound::Admin(text) => {
                    if self.admins.is_empty() {
                        warn!(
                            event_name = "assistant.admin.unconfigured",
                            customer_id = %customer_id,
                            "admin notice dropped; no admin numbers configured"
                        );
                    }
                    for admin in self.admins.recipients() {
                        self.send_text(admin, text).await;
                    }
                }
            }
        }
    }

    async fn send_text(&self, to: &CustomerId, text: &str) {
        if let Err(error) = self.messenger.send_text(to, text).await {
            warn!(
                event_name = "assistant.egress.send_failed",
                customer_id = %to,
                transport = self.messenger.mode(),
                error = %error,
                "outbound message dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use marmita_core::config::BusinessHoursConfig;
    use marmita_core::domain::customer::CustomerId;
    use marmita_core::flows::ConversationState;
    use marmita_sessions::{InactivityTimers, SessionStore};
    use marmita_whatsapp::events::InboundMessage;

    use super::{InboundDisposition, OrderAssistant};
    use crate::guardrails::{AdminDirectory, BusinessHours};
    use crate::testing::{engine, ApprovingGateway, RecordingMessenger, ADMIN, CUSTOMER};

    struct Harness {
        assistant: OrderAssistant,
        messenger: Arc<RecordingMessenger>,
        timers: Arc<InactivityTimers>,
        _expired: tokio::sync::mpsc::Receiver<marmita_sessions::TimerExpired>,
    }

    fn harness(hours: BusinessHours) -> Harness {
        let messenger = Arc::new(RecordingMessenger::default());
        let (timers, expired) = InactivityTimers::new(Duration::from_secs(600));
        let timers = Arc::new(timers);
        let assistant = OrderAssistant::new(
            engine(Arc::new(ApprovingGateway::default())),
            Arc::new(SessionStore::new()),
            timers.clone(),
            messenger.clone(),
            hours,
            AdminDirectory::from_numbers([ADMIN]).expect("admins"),
        );
        Harness { assistant, messenger, timers, _expired: expired }
    }

    fn message(from: &str, text: &str) -> InboundMessage {
        InboundMessage {
            customer_id: CustomerId(from.to_owned()),
            text: text.to_owned(),
            sender_name: None,
            message_id: None,
        }
    }

    fn weekday_hours() -> BusinessHours {
        BusinessHours::from_config(&BusinessHoursConfig {
            enabled: true,
            utc_offset_hours: -3,
            open_hour: 10,
            close_hour: 15,
            weekdays: vec![1, 2, 3, 4, 5],
        })
        .expect("hours")
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_message_is_answered_and_arms_the_timer() {
        let h = harness(BusinessHours::always_open());

        let disposition = h.assistant.handle_inbound(&message(CUSTOMER, "oi"), Utc::now()).await;

        assert!(matches!(disposition, InboundDisposition::Processed(ref outcome) if outcome.to == "asking_name"));
        let texts = h.messenger.texts_to(CUSTOMER);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("qual é o seu nome"));
        assert_eq!(h.timers.pending().await, 1);
        assert_eq!(h.assistant.store().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn closed_hours_reply_without_creating_a_session() {
        let h = harness(weekday_hours());
        let sunday = Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).single().expect("date");

        let disposition = h.assistant.handle_inbound(&message(CUSTOMER, "oi"), sunday).await;

        assert_eq!(disposition, InboundDisposition::Closed);
        assert!(h.messenger.texts_to(CUSTOMER)[0].contains("Estamos fechados"));
        assert!(h.assistant.store().is_empty().await);
        assert_eq!(h.timers.pending().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn admins_bypass_business_hours() {
        let h = harness(weekday_hours());
        let sunday = Utc.with_ymd_and_hms(2026, 10, 18, 14, 0, 0).single().expect("date");

        let disposition = h.assistant.handle_inbound(&message(ADMIN, "oi"), sunday).await;

        assert!(matches!(disposition, InboundDisposition::Processed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn feedback_reaches_admin_numbers() {
        let h = harness(BusinessHours::always_open());
        for text in ["oi", "Ana", "3", "Mais opções veganas"] {
            h.assistant.handle_inbound(&message(CUSTOMER, text), Utc::now()).await;
        }

        let admin_texts = h.messenger.texts_to(ADMIN);
        assert_eq!(admin_texts.len(), 1);
        assert!(admin_texts[0].contains("Mais opções veganas"));
    }

    #[tokio::test(start_paused = true)]
    async fn expired_timer_resets_a_live_session() {
        let h = harness(BusinessHours::always_open());
        let started = Utc::now();
        for text in ["oi", "Ana", "2"] {
            h.assistant.handle_inbound(&message(CUSTOMER, text), started).await;
        }
        h.messenger.clear();
        let generation = h.timers.reschedule(&CustomerId(CUSTOMER.to_owned())).await;
        let expiry = marmita_sessions::TimerExpired {
            customer_id: CustomerId(CUSTOMER.to_owned()),
            generation,
        };

        let outcome = h
            .assistant
            .handle_timeout(&expiry, started + chrono::Duration::minutes(10))
            .await
            .expect("timeout applied");

        assert_eq!(outcome.to, "initial");
        assert!(h.messenger.texts_to(CUSTOMER)[0].contains("inatividade"));
        let handle = h.assistant.store().get(&expiry.customer_id).await.expect("session");
        assert_eq!(handle.lock().await.state, ConversationState::Initial);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_skipped_after_recent_contact_or_supersede() {
        let h = harness(BusinessHours::always_open());
        let started = Utc::now();
        for text in ["oi", "Ana", "2"] {
            h.assistant.handle_inbound(&message(CUSTOMER, text), started).await;
        }
        let id = CustomerId(CUSTOMER.to_owned());

        let stale = marmita_sessions::TimerExpired { customer_id: id.clone(), generation: 0 };
        assert!(h.assistant.handle_timeout(&stale, started).await.is_none());

        let generation = h.timers.reschedule(&id).await;
        let current = marmita_sessions::TimerExpired { customer_id: id.clone(), generation };
        let early = started + chrono::Duration::minutes(2);
        assert!(h.assistant.handle_timeout(&current, early).await.is_none());

        let handle = h.assistant.store().get(&id).await.expect("session");
        assert!(matches!(handle.lock().await.state, ConversationState::PickingDish { .. }));
    }
}
