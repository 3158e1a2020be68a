pub mod events;
pub mod outbound;

pub use events::{parse_inbound, IgnoreReason, InboundEvent, InboundMessage};
pub use outbound::{GatewayMessenger, LogMessenger, Messenger, MessengerError};
