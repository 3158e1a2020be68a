use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::customer::CustomerId;
use crate::domain::session::Session;
use crate::pricing::format_brl;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReceiptLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Snapshot of a confirmed order, detached from the live session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub number: String,
    pub customer_id: CustomerId,
    pub customer_name: String,
    pub lines: Vec<ReceiptLine>,
    pub address: String,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub grand_total: Decimal,
    pub payment_id: Option<String>,
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    pub fn from_session(session: &Session, issued_at: DateTime<Utc>) -> Self {
        let lines = session
            .cart
            .configured_lines()
            .map(|line| ReceiptLine {
                description: line.description(),
                quantity: line.quantity.unwrap_or_default(),
                unit_price: line.unit_price,
                line_total: line.line_total(),
            })
            .collect::<Vec<_>>();
        let checkout = session.checkout.as_ref();
        let subtotal = checkout
            .map(|checkout| checkout.subtotal)
            .unwrap_or_else(|| lines.iter().map(|line| line.line_total).sum());
        let shipping_fee = checkout.map(|checkout| checkout.shipping_fee).unwrap_or_default();

        Self {
            number: Uuid::new_v4().simple().to_string()[..8].to_ascii_uppercase(),
            customer_id: session.customer_id.clone(),
            customer_name: session.display_name().to_owned(),
            lines,
            address: checkout.map(|checkout| checkout.address.clone()).unwrap_or_default(),
            subtotal,
            shipping_fee,
            grand_total: checkout
                .map(|checkout| checkout.grand_total)
                .unwrap_or(subtotal + shipping_fee),
            payment_id: checkout.and_then(|checkout| checkout.payment_id.clone()),
            issued_at,
        }
    }

    pub fn file_name(&self) -> String {
        format!("comprovante-{}.pdf", self.number)
    }

    /// Plain-text rendition, used whenever the document cannot be produced.
    pub fn to_text(&self) -> String {
        let mut text = format!("🧾 Comprovante #{}\n", self.number);
        for line in &self.lines {
            text.push_str(&format!(
                "• {}x {} ({})\n",
                line.quantity,
                line.description,
                format_brl(line.line_total)
            ));
        }
        text.push_str(&format!("Subtotal: {}\n", format_brl(self.subtotal)));
        text.push_str(&format!("Entrega: {}\n", format_brl(self.shipping_fee)));
        text.push_str(&format!("Total pago: {}\n", format_brl(self.grand_total)));
        if !self.address.is_empty() {
            text.push_str(&format!("Endereço: {}", self.address));
        }
        text.trim_end().to_owned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum ReceiptError {
    #[error("receipt template error: {0}")]
    Template(String),
    #[error("receipt conversion error: {0}")]
    Conversion(String),
    #[error("no document converter available")]
    ConverterUnavailable,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ReceiptRenderer: Send + Sync {
    async fn render(&self, receipt: &Receipt) -> Result<RenderedDocument, ReceiptError>;
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::Receipt;
    use crate::domain::cart::{CartLine, RiceVariant};
    use crate::domain::customer::CustomerId;
    use crate::domain::session::{Checkout, Session};
    use crate::shipping::PostalCode;

    fn paid_session() -> Session {
        let mut session = Session::new(CustomerId("5511999990000".to_owned()), Utc::now());
        session.name = "Ana".to_owned();
        let mut line = CartLine::new("Frango com arroz", Decimal::new(2_200, 2));
        line.quantity = Some(3);
        line.rice = Some(RiceVariant::White);
        session.cart.push(line);
        session.checkout = Some(Checkout {
            postal_code: PostalCode::parse("01310100").expect("postal code"),
            address: "Av. Paulista, 1000, apto 12".to_owned(),
            shipping_fee: Decimal::new(800, 2),
            shipping_text: "frete R$ 8,00".to_owned(),
            total_units: 3,
            unit_price: Decimal::new(2_200, 2),
            subtotal: Decimal::new(6_600, 2),
            grand_total: Decimal::new(7_400, 2),
            payment_id: Some("pay-1".to_owned()),
        });
        session
    }

    #[test]
    fn snapshot_carries_lines_and_totals() {
        let receipt = Receipt::from_session(&paid_session(), Utc::now());

        assert_eq!(receipt.lines.len(), 1);
        assert_eq!(receipt.lines[0].description, "Frango com arroz (arroz branco)");
        assert_eq!(receipt.lines[0].line_total, Decimal::new(6_600, 2));
        assert_eq!(receipt.grand_total, Decimal::new(7_400, 2));
        assert_eq!(receipt.payment_id.as_deref(), Some("pay-1"));
        assert_eq!(receipt.number.len(), 8);
        assert!(receipt.file_name().ends_with(".pdf"));
    }

    #[test]
    fn text_fallback_lists_total_and_address() {
        let text = Receipt::from_session(&paid_session(), Utc::now()).to_text();

        assert!(text.contains("3x Frango com arroz (arroz branco)"));
        assert!(text.contains("Total pago: R$ 74,00"));
        assert!(text.contains("Av. Paulista, 1000, apto 12"));
    }
}
