use std::sync::Arc;

use axum::Router;
use marmita_assistant::{AdminDirectory, BusinessHours, FulfillmentBridge, OrderAssistant};
use marmita_core::config::{AppConfig, ConfigError, LoadOptions};
use marmita_core::errors::ApplicationError;
use marmita_core::flows::ConversationEngine;
use marmita_core::payments::PaymentGateway;
use marmita_core::receipt::{ReceiptError, ReceiptRenderer};
use marmita_core::shipping::ShippingResolver;
use marmita_sessions::{spawn_sweeper, InactivityTimers, SessionStore, SweepPolicy, TimerExpired};
use marmita_whatsapp::{GatewayMessenger, LogMessenger, Messenger, MessengerError};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapters::{MercadoPagoGateway, TomlCatalog, ViaCepDistanceLookup};
use crate::health::{self, HealthState};
use crate::receipts::PdfReceiptRenderer;
use crate::webhooks::{self, InFlight, WebhookState};

pub struct Application {
    pub config: AppConfig,
    pub store: Arc<SessionStore>,
    pub assistant: Arc<OrderAssistant>,
    pub fulfillment: Arc<FulfillmentBridge>,
    pub messenger: Arc<dyn Messenger>,
    pub receipts_enabled: bool,
    pub in_flight: InFlight,
    timers: Arc<InactivityTimers>,
    expired: Option<mpsc::Receiver<TimerExpired>>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Application(#[from] ApplicationError),
    #[error("messaging gateway setup failed: {0}")]
    Messenger(#[from] MessengerError),
    #[error("http client setup failed: {0}")]
    HttpClient(#[source] reqwest::Error),
    #[error("receipt renderer setup failed: {0}")]
    Receipts(#[from] ReceiptError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let messenger: Arc<dyn Messenger> = match (&config.whatsapp.api_url, &config.whatsapp.token) {
        (Some(api_url), Some(token)) => Arc::new(GatewayMessenger::new(
            api_url.clone(),
            token.clone(),
            std::time::Duration::from_secs(config.whatsapp.timeout_secs),
        )?),
        _ => Arc::new(LogMessenger),
    };
    info!(
        event_name = "system.bootstrap.messaging_ready",
        correlation_id = "bootstrap",
        transport_mode = messenger.mode(),
        "messaging transport initialized"
    );

    let payments: Arc<dyn PaymentGateway> = Arc::new(
        MercadoPagoGateway::new(
            config.payments.api_url.clone(),
            config.payments.access_token.clone(),
            config.payments.notification_url.clone(),
            config.payments.payer_email.clone(),
            config.catalog.business_name.clone(),
            std::time::Duration::from_secs(config.payments.timeout_secs),
        )
        .map_err(BootstrapError::HttpClient)?,
    );
    let lookup = ViaCepDistanceLookup::new(
        config.shipping.postal_lookup_url.clone(),
        config.shipping.distance_url.clone(),
        config.shipping.api_key.clone(),
        config.shipping.origin.clone(),
        std::time::Duration::from_secs(config.shipping.timeout_secs),
    )
    .map_err(BootstrapError::HttpClient)?;
    let fees = ShippingResolver::new(
        lookup,
        config.shipping.ladder(),
        config.shipping.contingency_fee,
    );

    let engine = ConversationEngine::new(
        Arc::new(TomlCatalog::new(config.catalog.path.clone())),
        Arc::new(fees),
        payments.clone(),
        config.pricing.clone(),
        config.catalog.business_name.clone(),
    );

    let hours = BusinessHours::from_config(&config.business_hours)?;
    let admins = AdminDirectory::from_numbers(&config.whatsapp.admin_numbers)?;

    let renderer: Option<Arc<dyn ReceiptRenderer>> = if config.receipts.enabled {
        let renderer = PdfReceiptRenderer::new(
            &config.receipts.converter,
            config.catalog.business_name.clone(),
            hours.offset(),
        )?;
        renderer.has_converter().then(|| Arc::new(renderer) as Arc<dyn ReceiptRenderer>)
    } else {
        None
    };
    let receipts_enabled = renderer.is_some();

    let store = Arc::new(SessionStore::new());
    let (timers, expired) = InactivityTimers::new(config.sessions.inactivity_timeout());
    let timers = Arc::new(timers);

    let assistant = Arc::new(OrderAssistant::new(
        engine,
        store.clone(),
        timers.clone(),
        messenger.clone(),
        hours,
        admins.clone(),
    ));
    let fulfillment = Arc::new(FulfillmentBridge::new(
        store.clone(),
        messenger.clone(),
        payments,
        renderer,
        admins,
    ));

    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        receipts_enabled,
        "application components assembled"
    );

    Ok(Application {
        config,
        store,
        assistant,
        fulfillment,
        messenger,
        receipts_enabled,
        in_flight: InFlight::default(),
        timers,
        expired: Some(expired),
    })
}

impl Application {
    pub fn router(&self) -> Router {
        webhooks::router(WebhookState {
            assistant: self.assistant.clone(),
            fulfillment: self.fulfillment.clone(),
            in_flight: self.in_flight.clone(),
        })
        .merge(health::router(HealthState {
            store: self.store.clone(),
            messaging_mode: self.messenger.mode(),
            receipts_enabled: self.receipts_enabled,
        }))
    }

    /// Starts the idle sweeper and the inactivity loop. Only the first call spawns the loop.
    pub fn start_background(&mut self) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![spawn_sweeper(
            self.store.clone(),
            self.timers.clone(),
            SweepPolicy {
                interval: self.config.sessions.sweep_interval(),
                idle_threshold: self.config.sessions.idle_timeout(),
            },
        )];
        if let Some(expired) = self.expired.take() {
            tasks.push(self.assistant.clone().spawn_timeout_loop(expired));
        }
        tasks
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use marmita_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use marmita_core::domain::customer::CustomerId;
    use tower::ServiceExt;

    use crate::bootstrap::{bootstrap, bootstrap_with_config};

    fn open_config(catalog: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.business_hours.enabled = false;
        config.receipts.enabled = false;
        config.catalog.path = catalog.to_path_buf();
        config
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_on_invalid_configuration() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                whatsapp_api_url: Some("https://gateway.example.com/instance".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("whatsapp.token"), "{message}");
    }

    #[tokio::test]
    async fn development_defaults_use_the_log_transport() {
        let app = bootstrap_with_config(open_config(std::path::Path::new("config/catalog.toml")))
            .await
            .expect("bootstrap");

        assert_eq!(app.messenger.mode(), "log");
        assert!(!app.receipts_enabled);
        assert!(app.store.is_empty().await);
    }

    #[tokio::test]
    async fn inbound_webhook_drives_a_conversation() {
        let mut catalog = tempfile::NamedTempFile::new().expect("catalog");
        writeln!(catalog, "[[dishes]]\nname = \"Frango grelhado com arroz\"").expect("write");
        let app = bootstrap_with_config(open_config(catalog.path())).await.expect("bootstrap");
        let router = app.router();

        let response = router
            .clone()
            .oneshot(
                Request::post("/webhooks/messages")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"type":"ReceivedCallback","phone":"5511999990000","text":{"message":"oi"}}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let customer = CustomerId("5511999990000".to_string());
        let mut session = None;
        for _ in 0..50 {
            if let Some(found) = app.store.get(&customer).await {
                session = Some(found);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let session = session.expect("session created by the webhook");
        assert_eq!(session.lock().await.state.name(), "asking_name");

        let garbage = router
            .oneshot(Request::post("/webhooks/messages").body(Body::from("not json")).expect("request"))
            .await
            .expect("response");
        assert_eq!(garbage.status(), StatusCode::OK);
    }
}
