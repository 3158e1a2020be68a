use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::cart::CartLine;
use crate::domain::customer::CustomerId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Pix,
    Card,
}

impl PaymentMethod {
    pub fn label(self) -> &'static str {
        match self {
            Self::Pix => "PIX",
            Self::Card => "cartão",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixPayment {
    /// Copy-and-paste PIX code.
    pub payable_code: String,
    pub payment_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardCheckout {
    pub lines: Vec<CartLine>,
    pub shipping_fee: Decimal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Refunded,
    Other,
}

impl PaymentStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" | "in_process" | "authorized" => Self::Pending,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "cancelled" => Self::Cancelled,
            "refunded" | "charged_back" => Self::Refunded,
            _ => Self::Other,
        }
    }
}

/// Provider-side view of a payment as reported by a lifecycle callback or a lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentReport {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub external_reference: Option<String>,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Request(String),
    #[error("payment provider rejected the request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("payment provider response is missing `{0}`")]
    MissingField(&'static str),
}

/// Payment provider. Every failure is treated by callers as "retry available".
/// The customer id is passed as the external reference so the confirmation
/// callback can find the session again.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_pix_payment(
        &self,
        amount: Decimal,
        customer: &CustomerId,
    ) -> Result<PixPayment, PaymentError>;

    async fn create_card_payment_link(
        &self,
        checkout: &CardCheckout,
        customer: &CustomerId,
    ) -> Result<String, PaymentError>;

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentReport, PaymentError>;
}
