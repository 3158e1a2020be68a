use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use marmita_sessions::SessionStore;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    pub store: Arc<SessionStore>,
    pub messaging_mode: &'static str,
    pub receipts_enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub messaging: HealthCheck,
    pub receipts: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let messaging = match state.messaging_mode {
        "log" => HealthCheck {
            status: "degraded",
            detail: "no messaging gateway configured; outbound messages are only logged"
                .to_string(),
        },
        mode => HealthCheck { status: "ready", detail: format!("{mode} transport") },
    };
    let receipts = if state.receipts_enabled {
        HealthCheck { status: "ready", detail: "pdf receipts enabled".to_string() }
    } else {
        HealthCheck { status: "degraded", detail: "receipts are sent as text".to_string() }
    };

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: "marmita-server runtime initialized".to_string(),
        },
        messaging,
        receipts,
        active_sessions: state.store.len().await,
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}
