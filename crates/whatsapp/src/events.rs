use marmita_core::domain::customer::CustomerId;
use serde::Deserialize;
use serde_json::Value;

const RECEIVED_CALLBACK: &str = "ReceivedCallback";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub customer_id: CustomerId,
    pub text: String,
    pub sender_name: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    Malformed,
    NotAMessage,
    FromSelf,
    Group,
    Broadcast,
    NoText,
    InvalidSender,
}

impl IgnoreReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::NotAMessage => "not_a_message",
            Self::FromSelf => "from_self",
            Self::Group => "group",
            Self::Broadcast => "broadcast",
            Self::NoText => "no_text",
            Self::InvalidSender => "invalid_sender",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundEvent {
    Message(InboundMessage),
    Ignored(IgnoreReason),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InboundPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
    phone: Option<String>,
    #[serde(default)]
    from_me: bool,
    #[serde(default)]
    is_group: bool,
    #[serde(default)]
    broadcast: bool,
    sender_name: Option<String>,
    message_id: Option<String>,
    text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
struct TextBody {
    message: Option<String>,
}

/// Classifies a gateway callback. Only direct text messages from a customer
/// become [`InboundEvent::Message`].
pub fn parse_inbound(payload: &Value) -> InboundEvent {
    let Ok(payload) = InboundPayload::deserialize(payload) else {
        return InboundEvent::Ignored(IgnoreReason::Malformed);
    };

    if payload.kind.as_deref() != Some(RECEIVED_CALLBACK) {
        return InboundEvent::Ignored(IgnoreReason::NotAMessage);
    }
    if payload.from_me {
        return InboundEvent::Ignored(IgnoreReason::FromSelf);
    }
    let phone = payload.phone.unwrap_or_default();
    if payload.is_group || phone.ends_with("-group") || phone.ends_with("@g.us") {
        return InboundEvent::Ignored(IgnoreReason::Group);
    }
    if payload.broadcast || phone.ends_with("@broadcast") {
        return InboundEvent::Ignored(IgnoreReason::Broadcast);
    }
    let Some(text) = payload.text.and_then(|text| text.message) else {
        return InboundEvent::Ignored(IgnoreReason::NoText);
    };
    let Some(customer_id) = CustomerId::normalize(&phone) else {
        return InboundEvent::Ignored(IgnoreReason::InvalidSender);
    };

    InboundEvent::Message(InboundMessage {
        customer_id,
        text,
        sender_name: payload.sender_name.filter(|name| !name.trim().is_empty()),
        message_id: payload.message_id,
    })
}
