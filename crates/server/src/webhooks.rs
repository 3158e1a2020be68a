use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use marmita_assistant::{FulfillmentBridge, OrderAssistant, PaymentNotification};
use marmita_whatsapp::{parse_inbound, InboundEvent};
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const PAYMENT_TOPIC: &str = "payment";
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Count of webhook tasks still running, awaited on shutdown.
#[derive(Clone, Debug, Default)]
pub struct InFlight(Arc<AtomicUsize>);

struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl InFlight {
    fn enter(&self) -> InFlightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InFlightGuard(self.0.clone())
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub async fn drained(&self) {
        while self.count() > 0 {
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}

#[derive(Clone)]
pub struct WebhookState {
    pub assistant: Arc<OrderAssistant>,
    pub fulfillment: Arc<FulfillmentBridge>,
    pub in_flight: InFlight,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    pub correlation_id: String,
}

impl WebhookAck {
    fn accepted(correlation_id: String) -> Self {
        Self { status: "accepted", reason: None, correlation_id }
    }

    fn ignored(reason: &'static str, correlation_id: String) -> Self {
        Self { status: "ignored", reason: Some(reason), correlation_id }
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhooks/messages", post(inbound_message))
        .route("/webhooks/payments", post(payment_notification))
        .with_state(state)
}

/// Runs `work` detached; a panic inside it is logged instead of taking the server down.
pub fn supervise<F>(
    in_flight: &InFlight,
    task: &'static str,
    correlation_id: String,
    work: F,
) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let guard = in_flight.enter();
    let handle = tokio::spawn(work);
    tokio::spawn(async move {
        let result = handle.await;
        drop(guard);
        if let Err(join_error) = result {
            if join_error.is_panic() {
                error!(
                    event_name = "ingress.webhook.task_panicked",
                    task,
                    correlation_id = %correlation_id,
                    "webhook processing panicked"
                );
            }
        }
    })
}

pub async fn inbound_message(
    State(state): State<WebhookState>,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let correlation_id = Uuid::new_v4().to_string();
    let event = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => parse_inbound(&payload),
        Err(_) => InboundEvent::Ignored(marmita_whatsapp::IgnoreReason::Malformed),
    };

    let message = match event {
        InboundEvent::Message(message) => message,
        InboundEvent::Ignored(reason) => {
            debug!(
                event_name = "ingress.message.ignored",
                correlation_id = %correlation_id,
                reason = reason.as_str(),
                "inbound callback ignored"
            );
            return (StatusCode::OK, Json(WebhookAck::ignored(reason.as_str(), correlation_id)));
        }
    };

    info!(
        event_name = "ingress.message.received",
        correlation_id = %correlation_id,
        customer_id = %message.customer_id,
        "inbound message accepted"
    );
    let assistant = state.assistant.clone();
    supervise(&state.in_flight, "inbound_message", correlation_id.clone(), async move {
        assistant.handle_inbound(&message, Utc::now()).await;
    });

    (StatusCode::OK, Json(WebhookAck::accepted(correlation_id)))
}

pub async fn payment_notification(
    State(state): State<WebhookState>,
    Query(query): Query<HashMap<String, String>>,
    body: Bytes,
) -> (StatusCode, Json<WebhookAck>) {
    let correlation_id = Uuid::new_v4().to_string();
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);

    let notification = match parse_payment_notification(&payload, &query) {
        Ok(notification) => notification,
        Err(reason) => {
            debug!(
                event_name = "ingress.payment.ignored",
                correlation_id = %correlation_id,
                reason,
                "payment callback ignored"
            );
            return (StatusCode::OK, Json(WebhookAck::ignored(reason, correlation_id)));
        }
    };

    info!(
        event_name = "ingress.payment.received",
        correlation_id = %correlation_id,
        payment_id = %notification.payment_id,
        "payment notification accepted"
    );
    let fulfillment = state.fulfillment.clone();
    let task_correlation = correlation_id.clone();
    supervise(&state.in_flight, "payment_notification", correlation_id.clone(), async move {
        if let Err(error) = fulfillment.handle_notification(notification, Utc::now()).await {
            let error = error.into_interface(task_correlation);
            warn!(
                event_name = "ingress.payment.failed",
                correlation_id = %error.correlation_id(),
                error = %error,
                user_message = error.user_message(),
                "payment notification could not be resolved"
            );
        }
    });

    (StatusCode::OK, Json(WebhookAck::accepted(correlation_id)))
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Accepts both webhook bodies (`{"type": "payment", "data": {"id": ...}}`) and
/// legacy query notifications (`?topic=payment&id=...`). Only the payment id is
/// read; any inline status is re-fetched from the provider.
pub fn parse_payment_notification(
    payload: &Value,
    query: &HashMap<String, String>,
) -> Result<PaymentNotification, &'static str> {
    let topic = string_field(payload.get("type"))
        .or_else(|| string_field(payload.get("topic")))
        .or_else(|| query.get("type").cloned())
        .or_else(|| query.get("topic").cloned());
    let from_action = string_field(payload.get("action"))
        .is_some_and(|action| action.starts_with("payment."));
    if topic.as_deref() != Some(PAYMENT_TOPIC) && !from_action {
        return Err("not_a_payment");
    }

    let payment_id = string_field(payload.pointer("/data/id"))
        .or_else(|| string_field(payload.get("id")))
        .or_else(|| query.get("data.id").cloned())
        .or_else(|| query.get("id").cloned())
        .ok_or("missing_payment_id")?;

    Ok(PaymentNotification { payment_id })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use marmita_assistant::PaymentNotification;

    use super::{parse_payment_notification, supervise, InFlight};

    #[test]
    fn webhook_body_notification_is_parsed() {
        let notification = parse_payment_notification(
            &json!({"type": "payment", "action": "payment.updated", "data": {"id": "123"}}),
            &HashMap::new(),
        )
        .expect("notification");

        assert_eq!(notification.payment_id, "123");
    }

    #[test]
    fn inline_status_and_reference_are_not_trusted() {
        let notification = parse_payment_notification(
            &json!({
                "action": "payment.updated",
                "data": {"id": 99, "status": "approved", "external_reference": "5511999990000"}
            }),
            &HashMap::new(),
        )
        .expect("notification");

        assert_eq!(notification, PaymentNotification { payment_id: "99".to_owned() });
    }

    #[test]
    fn query_notifications_and_other_topics() {
        let query = HashMap::from([
            ("topic".to_string(), "payment".to_string()),
            ("id".to_string(), "777".to_string()),
        ]);
        let notification =
            parse_payment_notification(&serde_json::Value::Null, &query).expect("notification");
        assert_eq!(notification.payment_id, "777");

        let merchant_order = HashMap::from([
            ("topic".to_string(), "merchant_order".to_string()),
            ("id".to_string(), "1".to_string()),
        ]);
        assert_eq!(
            parse_payment_notification(&serde_json::Value::Null, &merchant_order).err(),
            Some("not_a_payment")
        );
        assert_eq!(
            parse_payment_notification(&json!({"type": "payment"}), &HashMap::new()).err(),
            Some("missing_payment_id")
        );
    }

    #[tokio::test]
    async fn supervised_panics_do_not_escape() {
        let in_flight = InFlight::default();
        let completed = Arc::new(AtomicUsize::new(0));
        let watcher = supervise(&in_flight, "test", "corr-1".to_string(), async {
            panic!("boom");
        });
        watcher.await.expect("watcher survives the panic");
        assert_eq!(in_flight.count(), 0);

        let counter = completed.clone();
        let watcher = supervise(&in_flight, "test", "corr-2".to_string(), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        in_flight.drained().await;
        watcher.await.expect("watcher");
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }
}
