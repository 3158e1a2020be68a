use std::time::Duration;

use async_trait::async_trait;
use marmita_core::domain::customer::CustomerId;
use marmita_core::receipt::RenderedDocument;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

const TOKEN_HEADER: &str = "Client-Token";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MessengerError {
    #[error("messaging client could not be built: {0}")]
    Client(String),
    #[error("messaging request failed: {0}")]
    Request(String),
    #[error("messaging gateway rejected the request with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("messaging gateway response missing `{0}`")]
    MissingField(&'static str),
}

/// Outbound side of the messaging channel. Delivery is best-effort; callers
/// log failures and move on.
#[async_trait]
pub trait Messenger: Send + Sync {
    fn mode(&self) -> &'static str;

    async fn send_text(&self, to: &CustomerId, text: &str) -> Result<(), MessengerError>;

    /// Stores the document with the gateway and returns a retrievable URL.
    async fn upload_document(&self, document: &RenderedDocument) -> Result<String, MessengerError>;

    async fn send_document(
        &self,
        to: &CustomerId,
        document_url: &str,
        file_name: &str,
        caption: &str,
    ) -> Result<(), MessengerError>;
}

/// Used when no gateway is configured: every message is written to the log.
#[derive(Default)]
pub struct LogMessenger;

#[async_trait]
impl Messenger for LogMessenger {
    fn mode(&self) -> &'static str {
        "log"
    }

    async fn send_text(&self, to: &CustomerId, text: &str) -> Result<(), MessengerError> {
        info!(
            event_name = "egress.whatsapp.text_logged",
            customer_id = %to,
            text,
            "outbound text (log transport)"
        );
        Ok(())
    }

    async fn upload_document(&self, document: &RenderedDocument) -> Result<String, MessengerError> {
        Ok(format!("log://documents/{}", document.file_name))
    }

    async fn send_document(
        &self,
        to: &CustomerId,
        document_url: &str,
        file_name: &str,
        caption: &str,
    ) -> Result<(), MessengerError> {
        info!(
            event_name = "egress.whatsapp.document_logged",
            customer_id = %to,
            document_url,
            file_name,
            caption,
            "outbound document (log transport)"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct SendTextRequest<'a> {
    phone: &'a str,
    message: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendDocumentRequest<'a> {
    phone: &'a str,
    document: &'a str,
    file_name: &'a str,
    caption: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

/// HTTP messaging gateway in the style of the hosted WhatsApp instance APIs.
pub struct GatewayMessenger {
    client: Client,
    api_url: String,
    token: SecretString,
}

impl GatewayMessenger {
    pub fn new(
        api_url: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, MessengerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| MessengerError::Client(error.to_string()))?;
        Ok(Self { client, api_url: api_url.into(), token })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, MessengerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(MessengerError::Rejected { status: status.as_u16(), detail })
    }
}

#[async_trait]
impl Messenger for GatewayMessenger {
    fn mode(&self) -> &'static str {
        "gateway"
    }

    async fn send_text(&self, to: &CustomerId, text: &str) -> Result<(), MessengerError> {
        let response = self
            .client
            .post(self.endpoint("send-text"))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .json(&SendTextRequest { phone: to.as_str(), message: text })
            .send()
            .await
            .map_err(|error| MessengerError::Request(error.to_string()))?;
        Self::check(response).await?;

        debug!(event_name = "egress.whatsapp.text_sent", customer_id = %to, "text delivered to gateway");
        Ok(())
    }

    async fn upload_document(&self, document: &RenderedDocument) -> Result<String, MessengerError> {
        let response = self
            .client
            .post(self.endpoint("upload-media"))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, document.content_type.as_str())
            .query(&[("fileName", document.file_name.as_str())])
            .body(document.bytes.clone())
            .send()
            .await
            .map_err(|error| MessengerError::Request(error.to_string()))?;
        let response = Self::check(response).await?;

        let body: UploadResponse =
            response.json().await.map_err(|error| MessengerError::Request(error.to_string()))?;
        body.url.filter(|url| !url.is_empty()).ok_or(MessengerError::MissingField("url"))
    }

    async fn send_document(
        &self,
        to: &CustomerId,
        document_url: &str,
        file_name: &str,
        caption: &str,
    ) -> Result<(), MessengerError> {
        let response = self
            .client
            .post(self.endpoint("send-document/pdf"))
            .header(TOKEN_HEADER, self.token.expose_secret())
            .json(&SendDocumentRequest {
                phone: to.as_str(),
                document: document_url,
                file_name,
                caption,
            })
            .send()
            .await
            .map_err(|error| MessengerError::Request(error.to_string()))?;
        Self::check(response).await?;

        debug!(
            event_name = "egress.whatsapp.document_sent",
            customer_id = %to,
            file_name,
            "document delivered to gateway"
        );
        Ok(())
    }
}
