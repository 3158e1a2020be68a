use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::cart::Cart;
use crate::domain::customer::CustomerId;
use crate::flows::states::ConversationState;
use crate::shipping::PostalCode;

/// Delivery and totals captured once the address/fee flow completes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub postal_code: PostalCode,
    pub address: String,
    pub shipping_fee: Decimal,
    pub shipping_text: String,
    pub total_units: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub grand_total: Decimal,
    pub payment_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub customer_id: CustomerId,
    pub state: ConversationState,
    pub name: String,
    pub cart: Cart,
    pub has_greeted: bool,
    pub payment_confirmed: bool,
    pub last_contact_at: DateTime<Utc>,
    pub last_prompt: Option<String>,
    pub checkout: Option<Checkout>,
}

impl Session {
    pub fn new(customer_id: CustomerId, now: DateTime<Utc>) -> Self {
        Self {
            customer_id,
            state: ConversationState::Initial,
            name: String::new(),
            cart: Cart::default(),
            has_greeted: false,
            payment_confirmed: false,
            last_contact_at: now,
            last_prompt: None,
            checkout: None,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_contact_at = now;
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_contact_at
    }

    /// Back to first-contact defaults; only the identifier and contact time survive.
    pub fn reset(&mut self) {
        let customer_id = self.customer_id.clone();
        let last_contact_at = self.last_contact_at;
        *self = Self::new(customer_id, last_contact_at);
    }

    /// Drops the order in progress but keeps the customer's profile, landing on the menu.
    pub fn clear_cart_keep_flow(&mut self) {
        self.cart.clear();
        self.checkout = None;
        self.payment_confirmed = false;
        self.state = ConversationState::Menu;
    }

    /// Applied by the payment confirmation path only.
    pub fn confirm_payment(&mut self) {
        self.payment_confirmed = true;
        self.state = ConversationState::Completed;
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "cliente"
        } else {
            &self.name
        }
    }
}
