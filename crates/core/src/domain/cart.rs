use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiceVariant {
    White,
    Brown,
}

impl RiceVariant {
    pub fn label(self) -> &'static str {
        match self {
            Self::White => "arroz branco",
            Self::Brown => "arroz integral",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SauceVariant {
    Red,
    White,
}

impl SauceVariant {
    pub fn label(self) -> &'static str {
        match self {
            Self::Red => "molho vermelho",
            Self::White => "molho branco",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub dish_name: String,
    pub unit_price: Decimal,
    /// `None` while the line is still being configured.
    pub quantity: Option<u32>,
    pub rice: Option<RiceVariant>,
    pub sauce: Option<SauceVariant>,
}

impl CartLine {
    pub fn new(dish_name: impl Into<String>, unit_price: Decimal) -> Self {
        Self { dish_name: dish_name.into(), unit_price, quantity: None, rice: None, sauce: None }
    }

    pub fn is_configured(&self) -> bool {
        self.quantity.is_some()
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity.unwrap_or(0))
    }

    /// Dish name followed by the chosen variants, e.g. `Frango com arroz (arroz branco)`.
    pub fn description(&self) -> String {
        let variants: Vec<&str> = self
            .rice
            .map(RiceVariant::label)
            .into_iter()
            .chain(self.sauce.map(SauceVariant::label))
            .collect();
        if variants.is_empty() {
            self.dish_name.clone()
        } else {
            format!("{} ({})", self.dish_name, variants.join(", "))
        }
    }
}

impl fmt::Display for CartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(quantity) = self.quantity {
            write!(f, "{quantity}x ")?;
        }
        f.write_str(&self.description())
    }
}

/// Lines are appended and mutated in place; only the whole cart is ever cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn push(&mut self, line: CartLine) {
        self.lines.push(line);
    }

    /// The line currently being configured.
    pub fn last_mut(&mut self) -> Option<&mut CartLine> {
        self.lines.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn total_units(&self) -> u32 {
        self.lines.iter().filter_map(|line| line.quantity).sum()
    }

    pub fn configured_lines(&self) -> impl Iterator<Item = &CartLine> {
        self.lines.iter().filter(|line| line.is_configured())
    }

    pub fn set_unit_price(&mut self, unit_price: Decimal) {
        for line in &mut self.lines {
            line.unit_price = unit_price;
        }
    }
}
