use std::sync::Arc;

use chrono::{DateTime, Utc};
use marmita_core::domain::customer::CustomerId;
use marmita_core::errors::ApplicationError;
use marmita_core::flows::{prompts, ConversationState};
use marmita_core::payments::{PaymentGateway, PaymentMethod, PaymentReport, PaymentStatus};
use marmita_core::receipt::{Receipt, ReceiptRenderer};
use marmita_sessions::SessionStore;
use marmita_whatsapp::outbound::Messenger;
use tracing::{info, warn};

use crate::guardrails::AdminDirectory;

/// Payment lifecycle callback. The callback is unauthenticated, so only the
/// payment id is taken from it; status and reference come from the provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentNotification {
    pub payment_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IgnoredNotification {
    NotApproved(PaymentStatus),
    MissingReference,
    UnknownCustomer(CustomerId),
    /// The session is not waiting on this payment: a different PIX charge,
    /// or an order already cancelled or restarted.
    NotAwaitingPayment(CustomerId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Confirmed { customer_id: CustomerId, document_sent: bool },
    AlreadyConfirmed(CustomerId),
    Ignored(IgnoredNotification),
}

/// Turns an approved payment into a completed order: customer thank-you,
/// receipt delivery and the kitchen notice to admins.
pub struct FulfillmentBridge {
    store: Arc<SessionStore>,
    messenger: Arc<dyn Messenger>,
    payments: Arc<dyn PaymentGateway>,
    renderer: Option<Arc<dyn ReceiptRenderer>>,
    admins: AdminDirectory,
}

impl FulfillmentBridge {
    pub fn new(
        store: Arc<SessionStore>,
        messenger: Arc<dyn Messenger>,
        payments: Arc<dyn PaymentGateway>,
        renderer: Option<Arc<dyn ReceiptRenderer>>,
        admins: AdminDirectory,
    ) -> Self {
        Self { store, messenger, payments, renderer, admins }
    }

    pub async fn handle_notification(
        &self,
        notification: PaymentNotification,
        now: DateTime<Utc>,
    ) -> Result<ConfirmationOutcome, ApplicationError> {
        let report = self.payments.fetch_payment(&notification.payment_id).await?;
        Ok(self.confirm(report, now).await)
    }

    /// Idempotent: a second approval for the same order only reports `AlreadyConfirmed`.
    /// Only a session in `AwaitingPayment` is confirmed; a PIX order also needs the
    /// payment id it was charged with.
    pub async fn confirm(&self, report: PaymentReport, now: DateTime<Utc>) -> ConfirmationOutcome {
        if report.status != PaymentStatus::Approved {
            info!(
                event_name = "fulfillment.payment.not_approved",
                payment_id = %report.payment_id,
                status = ?report.status,
                "payment notification without approval ignored"
            );
            return ConfirmationOutcome::Ignored(IgnoredNotification::NotApproved(report.status));
        }
        let Some(customer_id) =
            report.external_reference.as_deref().and_then(CustomerId::normalize)
        else {
            warn!(
                event_name = "fulfillment.payment.missing_reference",
                payment_id = %report.payment_id,
                "approved payment carries no usable customer reference"
            );
            return ConfirmationOutcome::Ignored(IgnoredNotification::MissingReference);
        };
        let Some(handle) = self.store.get(&customer_id).await else {
            warn!(
                event_name = "fulfillment.payment.unknown_customer",
                payment_id = %report.payment_id,
                customer_id = %customer_id,
                "approved payment for a customer without a session"
            );
            return ConfirmationOutcome::Ignored(IgnoredNotification::UnknownCustomer(customer_id));
        };

        let receipt = {
            let mut session = handle.lock().await;
            if session.payment_confirmed {
                info!(
                    event_name = "fulfillment.payment.duplicate",
                    payment_id = %report.payment_id,
                    customer_id = %customer_id,
                    "payment already confirmed"
                );
                return ConfirmationOutcome::AlreadyConfirmed(customer_id);
            }
            let awaiting = match (&session.state, session.checkout.as_ref()) {
                (ConversationState::AwaitingPayment { method: PaymentMethod::Pix }, Some(checkout)) => {
                    checkout.payment_id.as_deref() == Some(report.payment_id.as_str())
                }
                (ConversationState::AwaitingPayment { method: PaymentMethod::Card }, Some(_)) => true,
                _ => false,
            };
            if !awaiting {
                warn!(
                    event_name = "fulfillment.payment.not_awaiting",
                    payment_id = %report.payment_id,
                    customer_id = %customer_id,
                    state = session.state.name(),
                    "approved payment does not match an order awaiting payment"
                );
                return ConfirmationOutcome::Ignored(IgnoredNotification::NotAwaitingPayment(
                    customer_id,
                ));
            }
            session.confirm_payment();
            if let Some(checkout) = session.checkout.as_mut() {
                checkout.payment_id = Some(report.payment_id.clone());
            }
            Receipt::from_session(&session, now)
        };

        info!(
            event_name = "fulfillment.payment.confirmed",
            payment_id = %report.payment_id,
            customer_id = %customer_id,
            receipt = %receipt.number,
            grand_total = %receipt.grand_total,
            "order confirmed"
        );

        self.send_text(&customer_id, &prompts::payment_confirmed(&receipt.customer_name)).await;
        let document_sent = self.deliver_receipt(&customer_id, &receipt).await;
        if !document_sent {
            self.send_text(&customer_id, &prompts::receipt_unavailable(&receipt.to_text())).await;
        }

        let notice = prompts::order_for_admin(
            &receipt.customer_name,
            customer_id.as_str(),
            &receipt.to_text(),
        );
        for admin in self.admins.recipients() {
            self.send_text(admin, &notice).await;
        }

        ConfirmationOutcome::Confirmed { customer_id, document_sent }
    }

    async fn deliver_receipt(&self, customer_id: &CustomerId, receipt: &Receipt) -> bool {
        let Some(renderer) = &self.renderer else {
            return false;
        };
        let document = match renderer.render(receipt).await {
            Ok(document) => document,
            Err(error) => {
                warn!(
                    event_name = "fulfillment.receipt.render_failed",
                    customer_id = %customer_id,
                    error = %error,
                    "falling back to text receipt"
                );
                return false;
            }
        };
        let delivered = match self.messenger.upload_document(&document).await {
            Ok(url) => {
                self.messenger
                    .send_document(customer_id, &url, &document.file_name, &prompts::receipt_caption())
                    .await
            }
            Err(error) => Err(error),
        };
        if let Err(error) = delivered {
            warn!(
                event_name = "fulfillment.receipt.delivery_failed",
                customer_id = %customer_id,
                error = %error,
                "falling back to text receipt"
            );
            return false;
        }
        true
    }

    async fn send_text(&self, to: &CustomerId, text: &str) {
        if let Err(error) = self.messenger.send_text(to, text).await {
            warn!(
                event_name = "fulfillment.egress.send_failed",
                customer_id = %to,
                error = %error,
                "outbound message dropped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use chrono::Utc;
    use marmita_core::domain::cart::CartLine;
    use marmita_core::domain::customer::CustomerId;
    use marmita_core::domain::session::Checkout;
    use marmita_core::flows::ConversationState;
    use marmita_core::payments::{PaymentMethod, PaymentReport, PaymentStatus};
    use marmita_core::receipt::ReceiptRenderer;
    use marmita_core::shipping::PostalCode;
    use marmita_sessions::SessionStore;
    use rust_decimal::Decimal;

    use super::{ConfirmationOutcome, FulfillmentBridge, IgnoredNotification, PaymentNotification};
    use crate::guardrails::AdminDirectory;
    use crate::testing::{ApprovingGateway, RecordingMessenger, Sent, StubRenderer, ADMIN, CUSTOMER};

    struct Harness {
        bridge: FulfillmentBridge,
        store: Arc<SessionStore>,
        messenger: Arc<RecordingMessenger>,
        gateway: Arc<ApprovingGateway>,
    }

    fn harness(renderer: Option<StubRenderer>) -> Harness {
        let store = Arc::new(SessionStore::new());
        let messenger = Arc::new(RecordingMessenger::default());
        let gateway = Arc::new(ApprovingGateway::default());
        let bridge = FulfillmentBridge::new(
            store.clone(),
            messenger.clone(),
            gateway.clone(),
            renderer.map(|renderer| Arc::new(renderer) as Arc<dyn ReceiptRenderer>),
            AdminDirectory::from_numbers([ADMIN]).expect("admins"),
        );
        Harness { bridge, store, messenger, gateway }
    }

    fn customer() -> CustomerId {
        CustomerId(CUSTOMER.to_owned())
    }

    async fn awaiting_payment(store: &SessionStore) {
        let handle = store.get_or_create(&customer(), Utc::now()).await;
        let mut session = handle.lock().await;
        session.name = "Ana".to_owned();
        let mut line = CartLine::new("Salada completa", Decimal::new(2_200, 2));
        line.quantity = Some(2);
        session.cart.push(line);
        session.checkout = Some(Checkout {
            postal_code: PostalCode::parse("01310100").expect("postal code"),
            address: "Av. Paulista - Bela Vista, São Paulo, 1000".to_owned(),
            shipping_fee: Decimal::ZERO,
            shipping_text: "retirada".to_owned(),
            total_units: 2,
            unit_price: Decimal::new(2_200, 2),
            subtotal: Decimal::new(4_400, 2),
            grand_total: Decimal::new(4_400, 2),
            payment_id: Some("pay-1".to_owned()),
        });
        session.state = ConversationState::AwaitingPayment { method: PaymentMethod::Pix };
    }

    async fn session_state(store: &SessionStore) -> (ConversationState, bool) {
        let handle = store.get(&customer()).await.expect("session");
        let session = handle.lock().await;
        (session.state.clone(), session.payment_confirmed)
    }

    fn approved(reference: Option<&str>) -> PaymentReport {
        PaymentReport {
            payment_id: "pay-1".to_owned(),
            status: PaymentStatus::Approved,
            external_reference: reference.map(str::to_owned),
        }
    }

    #[tokio::test]
    async fn approval_completes_the_order_and_sends_the_receipt() {
        let h = harness(Some(StubRenderer::default()));
        awaiting_payment(&h.store).await;

        let outcome = h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;

        assert_eq!(outcome, ConfirmationOutcome::Confirmed { customer_id: customer(), document_sent: true });
        let handle = h.store.get(&customer()).await.expect("session");
        let session = handle.lock().await;
        assert!(session.payment_confirmed);
        assert_eq!(session.state, ConversationState::Completed);
        drop(session);

        let sent = h.messenger.sent();
        assert!(matches!(&sent[0], Sent::Text { to, text } if to == CUSTOMER && text.contains("Pagamento confirmado, Ana")));
        assert!(matches!(&sent[1], Sent::Document { to, file_name, .. } if to == CUSTOMER && file_name.starts_with("comprovante-")));
        let admin = h.messenger.texts_to(ADMIN);
        assert_eq!(admin.len(), 1);
        assert!(admin[0].contains("2x Salada completa"));
    }

    #[tokio::test]
    async fn duplicate_approval_is_acknowledged_once() {
        let h = harness(Some(StubRenderer::default()));
        awaiting_payment(&h.store).await;

        h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;
        let sent_after_first = h.messenger.sent().len();
        let second = h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;

        assert_eq!(second, ConfirmationOutcome::AlreadyConfirmed(customer()));
        assert_eq!(h.messenger.sent().len(), sent_after_first);
    }

    #[tokio::test]
    async fn rendering_failure_falls_back_to_text() {
        let h = harness(Some(StubRenderer { failing: true }));
        awaiting_payment(&h.store).await;

        let outcome = h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;

        assert_eq!(outcome, ConfirmationOutcome::Confirmed { customer_id: customer(), document_sent: false });
        let texts = h.messenger.texts_to(CUSTOMER);
        assert_eq!(texts.len(), 2);
        assert!(texts[1].contains("Total pago: R$ 44,00"));
    }

    #[tokio::test]
    async fn upload_failure_falls_back_to_text() {
        let h = harness(Some(StubRenderer::default()));
        h.messenger.fail_uploads.store(true, Ordering::SeqCst);
        awaiting_payment(&h.store).await;

        let outcome = h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;

        assert!(matches!(outcome, ConfirmationOutcome::Confirmed { document_sent: false, .. }));
        assert!(!h.messenger.sent().iter().any(|sent| matches!(sent, Sent::Document { .. })));
    }

    #[tokio::test]
    async fn non_approved_and_unmatched_payments_change_nothing() {
        let h = harness(None);
        awaiting_payment(&h.store).await;

        let pending = PaymentReport { status: PaymentStatus::Pending, ..approved(Some(CUSTOMER)) };
        assert_eq!(
            h.bridge.confirm(pending, Utc::now()).await,
            ConfirmationOutcome::Ignored(IgnoredNotification::NotApproved(PaymentStatus::Pending))
        );
        assert_eq!(
            h.bridge.confirm(approved(None), Utc::now()).await,
            ConfirmationOutcome::Ignored(IgnoredNotification::MissingReference)
        );
        assert_eq!(
            h.bridge.confirm(approved(Some("5511000000000")), Utc::now()).await,
            ConfirmationOutcome::Ignored(IgnoredNotification::UnknownCustomer(CustomerId(
                "5511000000000".to_owned()
            )))
        );

        let handle = h.store.get(&customer()).await.expect("session");
        assert!(!handle.lock().await.payment_confirmed);
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn notification_is_confirmed_from_the_provider_report() {
        let h = harness(None);
        awaiting_payment(&h.store).await;
        *h.gateway.reference.lock().expect("reference lock") = Some(CUSTOMER.to_owned());

        let outcome = h
            .bridge
            .handle_notification(PaymentNotification { payment_id: "pay-1".to_owned() }, Utc::now())
            .await
            .expect("notification handled");

        assert_eq!(outcome, ConfirmationOutcome::Confirmed { customer_id: customer(), document_sent: false });
    }

    #[tokio::test]
    async fn notification_unknown_to_the_provider_confirms_nothing() {
        let h = harness(None);
        awaiting_payment(&h.store).await;

        let outcome = h
            .bridge
            .handle_notification(PaymentNotification { payment_id: "forged".to_owned() }, Utc::now())
            .await
            .expect("notification handled");

        assert_eq!(outcome, ConfirmationOutcome::Ignored(IgnoredNotification::MissingReference));
        assert_eq!(
            session_state(&h.store).await,
            (ConversationState::AwaitingPayment { method: PaymentMethod::Pix }, false)
        );
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn approval_outside_awaiting_payment_is_ignored() {
        let h = harness(Some(StubRenderer::default()));
        let handle = h.store.get_or_create(&customer(), Utc::now()).await;
        {
            let mut session = handle.lock().await;
            session.name = "Ana".to_owned();
            session.cart.push(CartLine::new("Salada completa", Decimal::new(2_200, 2)));
            session.state = ConversationState::Quantity;
        }

        let outcome = h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;

        assert_eq!(outcome, ConfirmationOutcome::Ignored(IgnoredNotification::NotAwaitingPayment(customer())));
        assert_eq!(session_state(&h.store).await, (ConversationState::Quantity, false));
        assert!(h.messenger.sent().is_empty());
    }

    #[tokio::test]
    async fn replayed_approval_after_a_new_order_is_ignored() {
        let h = harness(Some(StubRenderer::default()));
        awaiting_payment(&h.store).await;
        h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;
        let handle = h.store.get(&customer()).await.expect("session");
        handle.lock().await.clear_cart_keep_flow();
        let sent_before = h.messenger.sent().len();

        let outcome = h.bridge.confirm(approved(Some(CUSTOMER)), Utc::now()).await;

        assert_eq!(outcome, ConfirmationOutcome::Ignored(IgnoredNotification::NotAwaitingPayment(customer())));
        assert_eq!(session_state(&h.store).await, (ConversationState::Menu, false));
        assert_eq!(h.messenger.sent().len(), sent_before);
    }

    #[tokio::test]
    async fn pix_approval_must_match_the_charged_payment() {
        let h = harness(None);
        awaiting_payment(&h.store).await;

        let other = PaymentReport { payment_id: "pay-2".to_owned(), ..approved(Some(CUSTOMER)) };
        let outcome = h.bridge.confirm(other, Utc::now()).await;

        assert_eq!(outcome, ConfirmationOutcome::Ignored(IgnoredNotification::NotAwaitingPayment(customer())));
        assert!(!session_state(&h.store).await.1);
    }

    #[tokio::test]
    async fn card_approval_is_accepted_with_the_provider_payment_id() {
        let h = harness(None);
        awaiting_payment(&h.store).await;
        {
            let handle = h.store.get(&customer()).await.expect("session");
            let mut session = handle.lock().await;
            session.state = ConversationState::AwaitingPayment { method: PaymentMethod::Card };
            if let Some(checkout) = session.checkout.as_mut() {
                checkout.payment_id = None;
            }
        }

        let report = PaymentReport { payment_id: "card-77".to_owned(), ..approved(Some(CUSTOMER)) };
        let outcome = h.bridge.confirm(report, Utc::now()).await;

        assert_eq!(outcome, ConfirmationOutcome::Confirmed { customer_id: customer(), document_sent: false });
        let handle = h.store.get(&customer()).await.expect("session");
        let session = handle.lock().await;
        assert_eq!(session.checkout.as_ref().and_then(|c| c.payment_id.as_deref()), Some("card-77"));
    }
}
