pub mod fulfillment;
pub mod guardrails;
pub mod runtime;

#[cfg(test)]
mod testing;

pub use fulfillment::{ConfirmationOutcome, FulfillmentBridge, IgnoredNotification, PaymentNotification};
pub use guardrails::{AdminDirectory, BusinessHours};
pub use runtime::{InboundDisposition, OrderAssistant};
