use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::cart::{CartLine, RiceVariant, SauceVariant};
use crate::domain::catalog::{CatalogSource, Dish};
use crate::domain::session::{Checkout, Session};
use crate::flows::prompts;
use crate::flows::states::{ConversationState, Input, Outbound, TransitionOutcome};
use crate::payments::{CardCheckout, PaymentGateway, PaymentMethod};
use crate::pricing::PricingPolicy;
use crate::shipping::{FeeResolver, PostalCode};
use crate::text::comparison_key;

const CANCEL_COMMANDS: [&str; 2] = ["cancelar", "cancelar pedido"];
const MIN_NAME_CHARS: usize = 2;
const MAX_QUANTITY: u32 = 99;

/// Replies accumulated while a single input is handled.
#[derive(Default)]
struct Replies(Vec<Outbound>);

impl Replies {
    fn say(&mut self, text: String) {
        self.0.push(Outbound::Customer(text));
    }

    /// Sends `text` and remembers it as the prompt to repeat when the next input is not understood.
    fn prompt(&mut self, session: &mut Session, text: String) {
        session.last_prompt = Some(text.clone());
        self.say(text);
    }

    fn admin(&mut self, text: String) {
        self.0.push(Outbound::Admin(text));
    }

    fn not_understood(&mut self, session: &Session) {
        self.say(prompts::not_understood(session.last_prompt.as_deref()));
    }
}

/// Drives one session through the ordering conversation.
///
/// Handling never fails: collaborator errors become customer-facing replies
/// and the session stays in a state from which the customer can retry.
/// Unrecognized input leaves every session field untouched.
pub struct ConversationEngine {
    catalog: Arc<dyn CatalogSource>,
    fees: Arc<dyn FeeResolver>,
    payments: Arc<dyn PaymentGateway>,
    pricing: PricingPolicy,
    business_name: String,
}

impl ConversationEngine {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        fees: Arc<dyn FeeResolver>,
        payments: Arc<dyn PaymentGateway>,
        pricing: PricingPolicy,
        business_name: impl Into<String>,
    ) -> Self {
        Self { catalog, fees, payments, pricing, business_name: business_name.into() }
    }

    pub fn pricing(&self) -> &PricingPolicy {
        &self.pricing
    }

    pub async fn handle(&self, session: &mut Session, input: &Input) -> TransitionOutcome {
        let from = session.state.name();
        let mut replies = Replies::default();

        match input {
            Input::Timeout => self.on_timeout(session, &mut replies),
            Input::Message(text) => self.on_message(session, text, &mut replies).await,
        }

        let outcome = TransitionOutcome { from, to: session.state.name(), replies: replies.0 };
        info!(
            event_name = "flow.transition_applied",
            customer_id = %session.customer_id,
            from = outcome.from,
            to = outcome.to,
            timeout = matches!(input, Input::Timeout),
            replies = outcome.replies.len(),
            "conversation transition applied"
        );
        outcome
    }

    fn on_timeout(&self, session: &mut Session, replies: &mut Replies) {
        if !session.state.is_live() {
            debug!(
                event_name = "flow.timeout_ignored",
                customer_id = %session.customer_id,
                state = session.state.name(),
                "inactivity timeout ignored outside live states"
            );
            return;
        }
        session.reset();
        replies.say(prompts::inactivity_notice());
    }

    async fn on_message(&self, session: &mut Session, text: &str, replies: &mut Replies) {
        let raw = text.trim();
        let key = comparison_key(raw);

        if CANCEL_COMMANDS.contains(&key.as_str()) {
            self.cancel(session, replies);
            return;
        }

        match session.state.clone() {
            ConversationState::Initial => {
                session.has_greeted = true;
                session.state = ConversationState::AskingName;
                replies.prompt(session, prompts::welcome(&self.business_name));
            }
            ConversationState::AskingName => self.capture_name(session, raw, replies),
            ConversationState::Menu => self.menu_choice(session, &key, replies).await,
            ConversationState::ViewingMenu => match key.as_str() {
                "1" | "pedir" | "fazer pedido" => {
                    if !self.present_dishes(session, replies).await {
                        session.state = ConversationState::Menu;
                        let menu = prompts::menu(session.display_name());
                        replies.prompt(session, menu);
                    }
                }
                "0" | "voltar" => self.back_to_menu(session, replies),
                _ => replies.not_understood(session),
            },
            ConversationState::PickingDish { options } => {
                self.pick_dish(session, &key, &options, replies)
            }
            ConversationState::RiceVariant { sauce_pending } => {
                self.pick_rice(session, &key, sauce_pending, replies)
            }
            ConversationState::SauceVariant => self.pick_sauce(session, &key, replies),
            ConversationState::Quantity => self.set_quantity(session, &key, replies),
            ConversationState::AddAnother => self.add_another(session, &key, replies).await,
            ConversationState::AwaitingPostalCode => {
                self.resolve_postal_code(session, raw, replies).await
            }
            ConversationState::ConfirmingAddressDetail => {
                self.confirm_address(session, raw, &key, replies)
            }
            ConversationState::ChoosingPaymentMethod | ConversationState::AwaitingPayment { .. } => {
                self.payment_choice(session, &key, replies).await
            }
            ConversationState::Completed => {
                if key == "1" || key.contains("novo pedido") {
                    self.back_to_menu(session, replies);
                } else {
                    replies.say(prompts::in_production());
                }
            }
            ConversationState::Feedback => self.collect_feedback(session, raw, &key, replies),
        }
    }

    fn cancel(&self, session: &mut Session, replies: &mut Replies) {
        if session.payment_confirmed {
            replies.say(prompts::cancel_refused());
            return;
        }
        session.clear_cart_keep_flow();
        replies.say(prompts::cancelled());
        let menu = prompts::menu(session.display_name());
        replies.prompt(session, menu);
    }

    fn back_to_menu(&self, session: &mut Session, replies: &mut Replies) {
        session.clear_cart_keep_flow();
        let menu = prompts::menu(session.display_name());
        replies.prompt(session, menu);
    }

    fn capture_name(&self, session: &mut Session, raw: &str, replies: &mut Replies) {
        if raw.chars().count() < MIN_NAME_CHARS {
            replies.say(prompts::name_too_short());
            return;
        }
        session.name = raw.to_owned();
        session.state = ConversationState::Menu;
        let menu = prompts::menu(session.display_name());
        replies.prompt(session, menu);
    }

    async fn menu_choice(&self, session: &mut Session, key: &str, replies: &mut Replies) {
        if key == "1" || key.contains("cardapio") {
            let Some(dishes) = self.load_dishes(session, replies).await else {
                return;
            };
            session.state = ConversationState::ViewingMenu;
            replies.prompt(session, prompts::catalog_view(&dishes));
        } else if key == "2" || key.contains("pedido") || key.contains("pedir") {
            self.present_dishes(session, replies).await;
        } else if key == "3" || key.contains("sugest") || key.contains("feedback") {
            session.state = ConversationState::Feedback;
            replies.prompt(session, prompts::feedback_prompt());
        } else {
            replies.not_understood(session);
        }
    }

    /// Reads the catalog fresh. An unreadable or empty catalog leaves the state as it was.
    async fn load_dishes(&self, session: &Session, replies: &mut Replies) -> Option<Vec<Dish>> {
        match self.catalog.dishes().await {
            Ok(dishes) if !dishes.is_empty() => Some(dishes),
            Ok(_) => {
                warn!(
                    event_name = "flow.catalog.empty",
                    customer_id = %session.customer_id,
                    "catalog has no dishes"
                );
                replies.say(prompts::catalog_unavailable());
                None
            }
            Err(error) => {
                warn!(
                    event_name = "flow.catalog.unavailable",
                    customer_id = %session.customer_id,
                    error = %error,
                    "catalog could not be loaded"
                );
                replies.say(prompts::catalog_unavailable());
                None
            }
        }
    }

    /// Lists the dishes to pick from; `false` when the catalog could not be shown.
    async fn present_dishes(&self, session: &mut Session, replies: &mut Replies) -> bool {
        let Some(dishes) = self.load_dishes(session, replies).await else {
            return false;
        };
        let text = prompts::dish_list(&dishes);
        session.state = ConversationState::PickingDish { options: dishes };
        replies.prompt(session, text);
        true
    }

    fn pick_dish(&self, session: &mut Session, key: &str, options: &[Dish], replies: &mut Replies) {
        let Some(dish) = key
            .parse::<usize>()
            .ok()
            .and_then(|choice| choice.checked_sub(1))
            .and_then(|index| options.get(index))
        else {
            replies.not_understood(session);
            return;
        };

        let requirements = dish.requirements();
        session.cart.push(CartLine::new(dish.name.clone(), self.pricing.standard_unit_price));

        if requirements.rice {
            session.state = ConversationState::RiceVariant { sauce_pending: requirements.sauce };
            replies.prompt(session, prompts::rice_prompt(&dish.name));
        } else if requirements.sauce {
            session.state = ConversationState::SauceVariant;
            replies.prompt(session, prompts::sauce_prompt(&dish.name));
        } else {
            self.ask_quantity(session, replies);
        }
    }

    fn pick_rice(&self, session: &mut Session, key: &str, sauce_pending: bool, replies: &mut Replies) {
        let variant = match key {
            "1" | "branco" | "arroz branco" => RiceVariant::White,
            "2" | "integral" | "arroz integral" => RiceVariant::Brown,
            _ => {
                replies.not_understood(session);
                return;
            }
        };
        let Some(line) = session.cart.last_mut() else {
            self.recover_missing_line(session, replies);
            return;
        };
        line.rice = Some(variant);
        let dish_name = line.dish_name.clone();

        if sauce_pending {
            session.state = ConversationState::SauceVariant;
            replies.prompt(session, prompts::sauce_prompt(&dish_name));
        } else {
            self.ask_quantity(session, replies);
        }
    }

    fn pick_sauce(&self, session: &mut Session, key: &str, replies: &mut Replies) {
        let variant = match key {
            "1" | "vermelho" | "molho vermelho" => SauceVariant::Red,
            "2" | "branco" | "molho branco" => SauceVariant::White,
            _ => {
                replies.not_understood(session);
                return;
            }
        };
        let Some(line) = session.cart.last_mut() else {
            self.recover_missing_line(session, replies);
            return;
        };
        line.sauce = Some(variant);
        self.ask_quantity(session, replies);
    }

    fn ask_quantity(&self, session: &mut Session, replies: &mut Replies) {
        let Some(line) = session.cart.lines().last() else {
            self.recover_missing_line(session, replies);
            return;
        };
        let text = prompts::quantity_prompt(line);
        session.state = ConversationState::Quantity;
        replies.prompt(session, text);
    }

    fn set_quantity(&self, session: &mut Session, key: &str, replies: &mut Replies) {
        let Some(quantity) =
            key.parse::<u32>().ok().filter(|quantity| (1..=MAX_QUANTITY).contains(quantity))
        else {
            replies.not_understood(session);
            return;
        };
        let Some(line) = session.cart.last_mut() else {
            self.recover_missing_line(session, replies);
            return;
        };
        line.quantity = Some(quantity);
        let added = prompts::line_added(line);

        session.state = ConversationState::AddAnother;
        replies.say(added);
        replies.prompt(session, prompts::add_another());
    }

    /// A variant or quantity state without a line to configure is not reachable
    /// through the flow; if it ever happens the order restarts from the menu.
    fn recover_missing_line(&self, session: &mut Session, replies: &mut Replies) {
        warn!(
            event_name = "flow.cart.missing_line",
            customer_id = %session.customer_id,
            state = session.state.name(),
            "no cart line to configure; returning to menu"
        );
        self.back_to_menu(session, replies);
    }

    async fn add_another(&self, session: &mut Session, key: &str, replies: &mut Replies) {
        if key == "0" {
            self.cancel(session, replies);
        } else if key == "1" || key.contains("sim") {
            self.present_dishes(session, replies).await;
        } else if key == "2" || key.contains("nao") || key.contains("finalizar") {
            let priced = self.pricing.price_cart(&mut session.cart);
            if priced.total_units == 0 {
                self.recover_missing_line(session, replies);
                return;
            }
            replies.say(prompts::order_summary(&session.cart, &priced, &self.pricing));
            session.state = ConversationState::AwaitingPostalCode;
            replies.prompt(session, prompts::postal_code_prompt());
        } else {
            replies.not_understood(session);
        }
    }

    async fn resolve_postal_code(&self, session: &mut Session, raw: &str, replies: &mut Replies) {
        let Some(postal_code) = PostalCode::parse(raw) else {
            replies.say(prompts::invalid_postal_code());
            return;
        };

        let quote = match self.fees.resolve_shipping(&postal_code).await {
            Ok(quote) => quote,
            Err(error) => {
                info!(
                    event_name = "flow.shipping.rejected",
                    customer_id = %session.customer_id,
                    postal_code = %postal_code,
                    error = %error,
                    "shipping could not be quoted"
                );
                replies.say(error.customer_message());
                return;
            }
        };

        let priced = self.pricing.price_cart(&mut session.cart);
        session.checkout = Some(Checkout {
            postal_code,
            address: quote.resolved_address.clone(),
            shipping_fee: quote.fee,
            shipping_text: quote.human_text.clone(),
            total_units: priced.total_units,
            unit_price: priced.unit_price,
            subtotal: priced.subtotal,
            grand_total: self.pricing.compute_total(
                priced.total_units,
                priced.unit_price,
                quote.fee,
            ),
            payment_id: None,
        });
        session.state = ConversationState::ConfirmingAddressDetail;
        replies.prompt(session, prompts::address_detail_prompt(&quote));
    }

    fn confirm_address(&self, session: &mut Session, raw: &str, key: &str, replies: &mut Replies) {
        if key == "0" {
            session.checkout = None;
            session.state = ConversationState::AwaitingPostalCode;
            replies.prompt(session, prompts::postal_code_prompt());
            return;
        }
        if raw.is_empty() {
            replies.not_understood(session);
            return;
        }
        let Some(checkout) = session.checkout.as_mut() else {
            session.state = ConversationState::AwaitingPostalCode;
            replies.prompt(session, prompts::postal_code_prompt());
            return;
        };
        checkout.address = format!("{}, {raw}", checkout.address);

        let summary = prompts::checkout_summary(&session.cart, checkout);
        session.state = ConversationState::ChoosingPaymentMethod;
        replies.say(summary);
        replies.prompt(session, prompts::payment_method());
    }

    async fn payment_choice(&self, session: &mut Session, key: &str, replies: &mut Replies) {
        let method = if key == "1" || key.contains("pix") {
            PaymentMethod::Pix
        } else if key == "2" || key.contains("cartao") {
            PaymentMethod::Card
        } else if key == "0" {
            session.state = ConversationState::ChoosingPaymentMethod;
            replies.prompt(session, prompts::payment_method());
            return;
        } else {
            replies.not_understood(session);
            return;
        };

        let Some(checkout) = session.checkout.clone() else {
            session.state = ConversationState::AwaitingPostalCode;
            replies.prompt(session, prompts::postal_code_prompt());
            return;
        };

        let created = match method {
            PaymentMethod::Pix => self
                .payments
                .create_pix_payment(checkout.grand_total, &session.customer_id)
                .await
                .map(|pix| {
                    (
                        Some(pix.payment_id),
                        vec![prompts::pix_instructions(&checkout), pix.payable_code],
                    )
                }),
            PaymentMethod::Card => {
                let card = CardCheckout {
                    lines: session.cart.configured_lines().cloned().collect(),
                    shipping_fee: checkout.shipping_fee,
                };
                self.payments
                    .create_card_payment_link(&card, &session.customer_id)
                    .await
                    .map(|link| (None, vec![prompts::card_link(&checkout, &link)]))
            }
        };

        match created {
            Ok((payment_id, texts)) => {
                // A card link has no payment id yet; any earlier PIX id is superseded.
                if let Some(checkout) = session.checkout.as_mut() {
                    checkout.payment_id = payment_id;
                }
                for text in texts {
                    replies.say(text);
                }
                session.state = ConversationState::AwaitingPayment { method };
                replies.prompt(session, prompts::awaiting_payment());
                info!(
                    event_name = "flow.payment.requested",
                    customer_id = %session.customer_id,
                    method = method.label(),
                    amount = %checkout.grand_total,
                    "payment requested from provider"
                );
            }
            Err(error) => {
                warn!(
                    event_name = "flow.payment.request_failed",
                    customer_id = %session.customer_id,
                    method = method.label(),
                    error = %error,
                    "payment provider call failed"
                );
                session.state = ConversationState::ChoosingPaymentMethod;
                replies.prompt(session, prompts::payment_failed());
            }
        }
    }

    fn collect_feedback(&self, session: &mut Session, raw: &str, key: &str, replies: &mut Replies) {
        if key == "0" {
            self.back_to_menu(session, replies);
            return;
        }
        if raw.is_empty() {
            replies.not_understood(session);
            return;
        }
        replies.admin(prompts::feedback_for_admin(
            session.display_name(),
            session.customer_id.as_str(),
            raw,
        ));
        replies.say(prompts::feedback_thanks());
        session.state = ConversationState::Menu;
        let menu = prompts::menu(session.display_name());
        replies.prompt(session, menu);
    }
}
