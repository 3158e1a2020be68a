//! Recording and scripted collaborators shared by the runtime and fulfillment tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use marmita_core::domain::catalog::StaticCatalog;
use marmita_core::domain::customer::CustomerId;
use marmita_core::flows::ConversationEngine;
use marmita_core::payments::{
    CardCheckout, PaymentError, PaymentGateway, PaymentReport, PaymentStatus, PixPayment,
};
use marmita_core::pricing::PricingPolicy;
use marmita_core::receipt::{Receipt, ReceiptError, ReceiptRenderer, RenderedDocument};
use marmita_core::shipping::{FeeResolver, PostalCode, ShippingError, ShippingQuote};
use marmita_whatsapp::outbound::{Messenger, MessengerError};
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Text { to: String, text: String },
    Document { to: String, url: String, file_name: String },
}

#[derive(Default)]
pub struct RecordingMessenger {
    pub sent: Mutex<Vec<Sent>>,
    pub fail_uploads: AtomicBool,
}

impl RecordingMessenger {
    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn texts_to(&self, to: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { to: recipient, text } if recipient == to => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.sent.lock().expect("sent lock").clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    fn mode(&self) -> &'static str {
        "recording"
    }

    async fn send_text(&self, to: &CustomerId, text: &str) -> Result<(), MessengerError> {
        self.sent
            .lock()
            .expect("sent lock")
            .push(Sent::Text { to: to.as_str().to_owned(), text: text.to_owned() });
        Ok(())
    }

    async fn upload_document(&self, document: &RenderedDocument) -> Result<String, MessengerError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(MessengerError::Rejected { status: 500, detail: "storage down".to_owned() });
        }
        Ok(format!("https://files.example.com/{}", document.file_name))
    }

    async fn send_document(
        &self,
        to: &CustomerId,
        document_url: &str,
        file_name: &str,
        _caption: &str,
    ) -> Result<(), MessengerError> {
        self.sent.lock().expect("sent lock").push(Sent::Document {
            to: to.as_str().to_owned(),
            url: document_url.to_owned(),
            file_name: file_name.to_owned(),
        });
        Ok(())
    }
}

pub struct FixedFee;

#[async_trait]
impl FeeResolver for FixedFee {
    async fn resolve_shipping(
        &self,
        postal_code: &PostalCode,
    ) -> Result<ShippingQuote, ShippingError> {
        Ok(ShippingQuote {
            postal_code: postal_code.clone(),
            fee: Decimal::new(800, 2),
            human_text: "4,2 km de distância, frete R$ 8,00".to_owned(),
            resolved_address: "Av. Paulista - Bela Vista, São Paulo".to_owned(),
            contingency: false,
        })
    }
}

/// Approves every payment; `fetch_payment` reports the configured reference.
#[derive(Default)]
pub struct ApprovingGateway {
    pub reference: Mutex<Option<String>>,
}

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    async fn create_pix_payment(
        &self,
        _amount: Decimal,
        _customer: &CustomerId,
    ) -> Result<PixPayment, PaymentError> {
        Ok(PixPayment { payable_code: "00020126PIXCODE".to_owned(), payment_id: "pay-1".to_owned() })
    }

    async fn create_card_payment_link(
        &self,
        _checkout: &CardCheckout,
        _customer: &CustomerId,
    ) -> Result<String, PaymentError> {
        Ok("https://pay.example.com/checkout/abc".to_owned())
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentReport, PaymentError> {
        Ok(PaymentReport {
            payment_id: payment_id.to_owned(),
            status: PaymentStatus::Approved,
            external_reference: self.reference.lock().expect("reference lock").clone(),
        })
    }
}

#[derive(Default)]
pub struct StubRenderer {
    pub failing: bool,
}

#[async_trait]
impl ReceiptRenderer for StubRenderer {
    async fn render(&self, receipt: &Receipt) -> Result<RenderedDocument, ReceiptError> {
        if self.failing {
            return Err(ReceiptError::ConverterUnavailable);
        }
        Ok(RenderedDocument {
            bytes: b"%PDF-1.4".to_vec(),
            file_name: receipt.file_name(),
            content_type: "application/pdf".to_owned(),
        })
    }
}

pub fn engine(payments: Arc<dyn PaymentGateway>) -> ConversationEngine {
    ConversationEngine::new(
        Arc::new(StaticCatalog::from_names(["Frango grelhado com arroz", "Salada completa"])),
        Arc::new(FixedFee),
        payments,
        PricingPolicy::default(),
        "Marmitaria da Vila",
    )
}

pub const CUSTOMER: &str = "5511999990000";
pub const ADMIN: &str = "5511988887777";
