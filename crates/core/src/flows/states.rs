use serde::{Deserialize, Serialize};

use crate::domain::catalog::Dish;
use crate::payments::PaymentMethod;

/// Node of the ordering conversation. Data that is only meaningful while a
/// given state is active travels as that variant's payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConversationState {
    #[default]
    Initial,
    AskingName,
    Menu,
    ViewingMenu,
    PickingDish {
        options: Vec<Dish>,
    },
    RiceVariant {
        sauce_pending: bool,
    },
    SauceVariant,
    Quantity,
    AddAnother,
    AwaitingPostalCode,
    ConfirmingAddressDetail,
    ChoosingPaymentMethod,
    AwaitingPayment {
        method: PaymentMethod,
    },
    Completed,
    Feedback,
}

impl ConversationState {
    pub const NAMES: [&'static str; 15] = [
        "initial",
        "asking_name",
        "menu",
        "viewing_menu",
        "picking_dish",
        "rice_variant",
        "sauce_variant",
        "quantity",
        "add_another",
        "awaiting_postal_code",
        "confirming_address_detail",
        "choosing_payment_method",
        "awaiting_payment",
        "completed",
        "feedback",
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::AskingName => "asking_name",
            Self::Menu => "menu",
            Self::ViewingMenu => "viewing_menu",
            Self::PickingDish { .. } => "picking_dish",
            Self::RiceVariant { .. } => "rice_variant",
            Self::SauceVariant => "sauce_variant",
            Self::Quantity => "quantity",
            Self::AddAnother => "add_another",
            Self::AwaitingPostalCode => "awaiting_postal_code",
            Self::ConfirmingAddressDetail => "confirming_address_detail",
            Self::ChoosingPaymentMethod => "choosing_payment_method",
            Self::AwaitingPayment { .. } => "awaiting_payment",
            Self::Completed => "completed",
            Self::Feedback => "feedback",
        }
    }

    /// Live states are force-reset by the inactivity timer. `Initial` and `Menu`
    /// are idle, `AwaitingPayment` waits on the provider, `Completed` is terminal.
    pub fn is_live(&self) -> bool {
        !matches!(
            self,
            Self::Initial | Self::Menu | Self::AwaitingPayment { .. } | Self::Completed
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Message(String),
    Timeout,
}

impl Input {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outbound {
    Customer(String),
    Admin(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub from: &'static str,
    pub to: &'static str,
    pub replies: Vec<Outbound>,
}

impl TransitionOutcome {
    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }

    pub fn customer_texts(&self) -> Vec<&str> {
        self.replies
            .iter()
            .filter_map(|reply| match reply {
                Outbound::Customer(text) => Some(text.as_str()),
                Outbound::Admin(_) => None,
            })
            .collect()
    }

    pub fn admin_texts(&self) -> Vec<&str> {
        self.replies
            .iter()
            .filter_map(|reply| match reply {
                Outbound::Admin(text) => Some(text.as_str()),
                Outbound::Customer(_) => None,
            })
            .collect()
    }
}
