use std::time::Duration;

use async_trait::async_trait;
use marmita_core::domain::customer::CustomerId;
use marmita_core::payments::{
    CardCheckout, PaymentError, PaymentGateway, PaymentReport, PaymentStatus, PixPayment,
};
use reqwest::{Client, RequestBuilder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";
const CURRENCY: &str = "BRL";
const SHIPPING_ITEM_TITLE: &str = "Entrega";

#[derive(Debug, Serialize)]
struct PixRequest<'a> {
    transaction_amount: f64,
    description: &'a str,
    payment_method_id: &'static str,
    payer: Payer<'a>,
    external_reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Payer<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PreferenceRequest<'a> {
    items: Vec<PreferenceItem>,
    external_reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
}

#[derive(Debug, Serialize, PartialEq)]
struct PreferenceItem {
    title: String,
    quantity: u32,
    unit_price: f64,
    currency_id: &'static str,
}

fn amount(value: Decimal) -> f64 {
    value.round_dp(2).to_f64().unwrap_or_default()
}

fn preference_items(checkout: &CardCheckout) -> Vec<PreferenceItem> {
    let mut items = checkout
        .lines
        .iter()
        .filter(|line| line.is_configured())
        .map(|line| PreferenceItem {
            title: line.description(),
            quantity: line.quantity.unwrap_or_default(),
            unit_price: amount(line.unit_price),
            currency_id: CURRENCY,
        })
        .collect::<Vec<_>>();
    if checkout.shipping_fee > Decimal::ZERO {
        items.push(PreferenceItem {
            title: SHIPPING_ITEM_TITLE.to_owned(),
            quantity: 1,
            unit_price: amount(checkout.shipping_fee),
            currency_id: CURRENCY,
        });
    }
    items
}

fn id_field(body: &Value, field: &'static str) -> Result<String, PaymentError> {
    match body.get(field) {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(PaymentError::MissingField(field)),
    }
}

fn parse_pix(body: &Value) -> Result<PixPayment, PaymentError> {
    let payment_id = id_field(body, "id")?;
    let payable_code = body
        .pointer("/point_of_interaction/transaction_data/qr_code")
        .and_then(Value::as_str)
        .filter(|code| !code.is_empty())
        .ok_or(PaymentError::MissingField("point_of_interaction.transaction_data.qr_code"))?;
    Ok(PixPayment { payable_code: payable_code.to_owned(), payment_id })
}

fn parse_report(body: &Value) -> Result<PaymentReport, PaymentError> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .ok_or(PaymentError::MissingField("status"))?;
    Ok(PaymentReport {
        payment_id: id_field(body, "id")?,
        status: PaymentStatus::parse(status),
        external_reference: body
            .get("external_reference")
            .and_then(Value::as_str)
            .filter(|reference| !reference.is_empty())
            .map(str::to_owned),
    })
}

/// Mercado Pago: PIX through `/v1/payments`, card through a checkout preference link.
pub struct MercadoPagoGateway {
    client: Client,
    api_url: String,
    access_token: Option<SecretString>,
    notification_url: Option<String>,
    payer_email: String,
    description: String,
}

impl MercadoPagoGateway {
    pub fn new(
        api_url: impl Into<String>,
        access_token: Option<SecretString>,
        notification_url: Option<String>,
        payer_email: impl Into<String>,
        description: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_url: api_url.into(),
            access_token,
            notification_url,
            payer_email: payer_email.into(),
            description: description.into(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, PaymentError> {
        let token = self
            .access_token
            .as_ref()
            .ok_or_else(|| PaymentError::Request("payments access token is not configured".to_owned()))?;
        let response = request
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|error| PaymentError::Request(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(PaymentError::Rejected { status: status.as_u16(), detail });
        }
        response.json::<Value>().await.map_err(|error| PaymentError::Request(error.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    async fn create_pix_payment(
        &self,
        amount_due: Decimal,
        customer: &CustomerId,
    ) -> Result<PixPayment, PaymentError> {
        let body = PixRequest {
            transaction_amount: amount(amount_due),
            description: &self.description,
            payment_method_id: "pix",
            payer: Payer { email: &self.payer_email },
            external_reference: customer.as_str(),
            notification_url: self.notification_url.as_deref(),
        };
        let request = self
            .client
            .post(self.endpoint("v1/payments"))
            .header(IDEMPOTENCY_HEADER, Uuid::new_v4().to_string())
            .json(&body);
        let payment = parse_pix(&self.send(request).await?)?;

        info!(
            event_name = "egress.payments.pix_created",
            customer_id = %customer,
            payment_id = %payment.payment_id,
            amount = %amount_due,
            "pix payment created"
        );
        Ok(payment)
    }

    async fn create_card_payment_link(
        &self,
        checkout: &CardCheckout,
        customer: &CustomerId,
    ) -> Result<String, PaymentError> {
        let body = PreferenceRequest {
            items: preference_items(checkout),
            external_reference: customer.as_str(),
            notification_url: self.notification_url.as_deref(),
        };
        let request = self.client.post(self.endpoint("checkout/preferences")).json(&body);
        let response = self.send(request).await?;
        let link = response
            .get("init_point")
            .and_then(Value::as_str)
            .filter(|link| !link.is_empty())
            .ok_or(PaymentError::MissingField("init_point"))?;

        info!(
            event_name = "egress.payments.card_link_created",
            customer_id = %customer,
            "card checkout link created"
        );
        Ok(link.to_owned())
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<PaymentReport, PaymentError> {
        let request = self.client.get(self.endpoint(&format!("v1/payments/{payment_id}")));
        parse_report(&self.send(request).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use marmita_core::domain::cart::CartLine;
    use marmita_core::domain::customer::CustomerId;
    use marmita_core::payments::{CardCheckout, PaymentError, PaymentGateway, PaymentStatus};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{parse_pix, parse_report, preference_items, MercadoPagoGateway, PreferenceItem};

    #[test]
    fn pix_response_yields_code_and_numeric_id() {
        let payment = parse_pix(&json!({
            "id": 1_234_567_890_u64,
            "status": "pending",
            "point_of_interaction": {"transaction_data": {"qr_code": "00020126PIX"}}
        }))
        .expect("pix");

        assert_eq!(payment.payment_id, "1234567890");
        assert_eq!(payment.payable_code, "00020126PIX");
        assert_eq!(
            parse_pix(&json!({"id": 1})).err(),
            Some(PaymentError::MissingField("point_of_interaction.transaction_data.qr_code"))
        );
    }

    #[test]
    fn payment_lookup_reports_status_and_reference() {
        let report = parse_report(&json!({
            "id": 42,
            "status": "approved",
            "external_reference": "5511999990000"
        }))
        .expect("report");

        assert_eq!(report.payment_id, "42");
        assert_eq!(report.status, PaymentStatus::Approved);
        assert_eq!(report.external_reference.as_deref(), Some("5511999990000"));
    }

    #[test]
    fn card_preference_itemizes_lines_and_shipping() {
        let mut line = CartLine::new("Salada completa", Decimal::new(1_900, 2));
        line.quantity = Some(6);
        let unfinished = CartLine::new("Frango com arroz", Decimal::new(2_200, 2));
        let checkout = CardCheckout { lines: vec![line, unfinished], shipping_fee: Decimal::new(800, 2) };

        let items = preference_items(&checkout);

        assert_eq!(
            items,
            vec![
                PreferenceItem {
                    title: "Salada completa".to_owned(),
                    quantity: 6,
                    unit_price: 19.0,
                    currency_id: "BRL",
                },
                PreferenceItem {
                    title: "Entrega".to_owned(),
                    quantity: 1,
                    unit_price: 8.0,
                    currency_id: "BRL",
                },
            ]
        );
    }

    #[tokio::test]
    async fn missing_access_token_fails_without_network() {
        let gateway = MercadoPagoGateway::new(
            "https://api.mercadopago.com",
            None,
            None,
            "pedidos@marmita.local",
            "Marmitaria",
            Duration::from_secs(1),
        )
        .expect("client");

        assert!(!gateway.is_configured());
        let error = gateway
            .create_pix_payment(Decimal::new(7_400, 2), &CustomerId("5511999990000".to_owned()))
            .await
            .expect_err("no token");
        assert!(matches!(error, PaymentError::Request(_)));
    }
}
