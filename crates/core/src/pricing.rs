use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::cart::Cart;

/// Per-unit pricing with a single bulk breakpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    pub standard_unit_price: Decimal,
    pub promotional_unit_price: Decimal,
    pub bulk_threshold: u32,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            standard_unit_price: Decimal::new(2_200, 2),
            promotional_unit_price: Decimal::new(1_900, 2),
            bulk_threshold: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedOrder {
    pub total_units: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl PricingPolicy {
    pub fn unit_price(&self, total_units: u32) -> Decimal {
        if total_units >= self.bulk_threshold {
            self.promotional_unit_price
        } else {
            self.standard_unit_price
        }
    }

    pub fn compute_subtotal(&self, units: u32, unit_price: Decimal) -> Decimal {
        Decimal::from(units) * unit_price
    }

    pub fn compute_total(&self, units: u32, unit_price: Decimal, fee: Decimal) -> Decimal {
        self.compute_subtotal(units, unit_price) + fee
    }

    /// Reprices every line at the unit price the whole order qualifies for.
    pub fn price_cart(&self, cart: &mut Cart) -> PricedOrder {
        let total_units = cart.total_units();
        let unit_price = self.unit_price(total_units);
        cart.set_unit_price(unit_price);

        PricedOrder {
            total_units,
            unit_price,
            subtotal: self.compute_subtotal(total_units, unit_price),
        }
    }
}

/// `R$ 1.234,50`
pub fn format_brl(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let plain = format!("{:.2}", rounded.abs());
    let (integer, cents) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (index, digit) in integer.chars().enumerate() {
        if index > 0 && (integer.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    format!("{}R$ {grouped},{cents}", if negative { "-" } else { "" })
}
