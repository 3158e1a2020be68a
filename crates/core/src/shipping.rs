use std::fmt;

use async_trait::async_trait;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::pricing::format_brl;
use crate::text::digits_only;

const POSTAL_CODE_DIGITS: usize = 8;

/// Brazilian CEP: exactly eight digits once punctuation is stripped.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostalCode(String);

impl PostalCode {
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = digits_only(raw);
        (digits.len() == POSTAL_CODE_DIGITS).then_some(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `01310-100`
    pub fn formatted(&self) -> String {
        let (head, tail) = self.0.split_at(5);
        format!("{head}-{tail}")
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceQuote {
    pub distance_km: Decimal,
    pub resolved_address: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("postal code `{0}` was not found")]
    NotFound(String),
    #[error("distance provider failed: {0}")]
    Provider(String),
}

/// External geocoding + route distance service.
#[async_trait]
pub trait DistanceLookup: Send + Sync {
    async fn lookup(&self, postal_code: &PostalCode) -> Result<DistanceQuote, LookupError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub max_km: Decimal,
    pub fee: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLadder {
    tiers: Vec<FeeTier>,
}

impl Default for FeeLadder {
    fn default() -> Self {
        Self::new(vec![
            FeeTier { max_km: Decimal::from(3), fee: Decimal::new(500, 2) },
            FeeTier { max_km: Decimal::from(8), fee: Decimal::new(800, 2) },
            FeeTier { max_km: Decimal::from(14), fee: Decimal::new(1_200, 2) },
            FeeTier { max_km: Decimal::from(20), fee: Decimal::new(1_600, 2) },
        ])
    }
}

impl FeeLadder {
    pub fn new(mut tiers: Vec<FeeTier>) -> Self {
        tiers.sort_by(|left, right| left.max_km.cmp(&right.max_km));
        Self { tiers }
    }

    pub fn tiers(&self) -> &[FeeTier] {
        &self.tiers
    }

    pub fn max_km(&self) -> Decimal {
        self.tiers.last().map(|tier| tier.max_km).unwrap_or_default()
    }

    pub fn fee_for(&self, distance_km: Decimal) -> Option<Decimal> {
        self.tiers.iter().find(|tier| distance_km <= tier.max_km).map(|tier| tier.fee)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub postal_code: PostalCode,
    pub fee: Decimal,
    pub human_text: String,
    pub resolved_address: String,
    /// Set when the fee is the contingency value rather than a distance-based one.
    pub contingency: bool,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ShippingError {
    #[error("postal code `{0}` was not found")]
    NotFound(String),
    #[error("distance {distance_km}km exceeds delivery radius of {max_km}km")]
    OutOfRange { distance_km: Decimal, max_km: Decimal },
    #[error("shipping quote unavailable: {0}")]
    Unavailable(String),
}

impl ShippingError {
    /// Pre-authored text relayed to the customer as-is.
    pub fn customer_message(&self) -> String {
        match self {
            Self::NotFound(_) => {
                "❌ Não encontramos esse CEP. Confira os números e envie novamente.".to_owned()
            }
            Self::OutOfRange { distance_km, max_km } => format!(
                "😔 Infelizmente seu endereço fica a {} e nossa entrega vai até {}. \
                 Envie outro CEP se quiser receber em outro endereço.",
                format_km(*distance_km),
                format_km(*max_km)
            ),
            Self::Unavailable(_) => {
                "⚠️ Não conseguimos calcular o frete agora. Envie seu CEP novamente em instantes."
                    .to_owned()
            }
        }
    }
}

#[async_trait]
pub trait FeeResolver: Send + Sync {
    async fn resolve_shipping(&self, postal_code: &PostalCode)
        -> Result<ShippingQuote, ShippingError>;
}

/// Maps a distance lookup onto the fee ladder. When the provider fails and a
/// contingency fee is configured, the order proceeds with that fee.
pub struct ShippingResolver<L> {
    lookup: L,
    ladder: FeeLadder,
    contingency_fee: Option<Decimal>,
}

impl<L> ShippingResolver<L>
where
    L: DistanceLookup,
{
    pub fn new(lookup: L, ladder: FeeLadder, contingency_fee: Option<Decimal>) -> Self {
        Self { lookup, ladder, contingency_fee }
    }
}

#[async_trait]
impl<L> FeeResolver for ShippingResolver<L>
where
    L: DistanceLookup,
{
    async fn resolve_shipping(
        &self,
        postal_code: &PostalCode,
    ) -> Result<ShippingQuote, ShippingError> {
        match self.lookup.lookup(postal_code).await {
            Ok(quote) => {
                let Some(fee) = self.ladder.fee_for(quote.distance_km) else {
                    return Err(ShippingError::OutOfRange {
                        distance_km: quote.distance_km,
                        max_km: self.ladder.max_km(),
                    });
                };
                Ok(ShippingQuote {
                    postal_code: postal_code.clone(),
                    fee,
                    human_text: format!(
                        "{} de distância, frete {}",
                        format_km(quote.distance_km),
                        format_brl(fee)
                    ),
                    resolved_address: quote.resolved_address,
                    contingency: false,
                })
            }
            Err(LookupError::NotFound(code)) => Err(ShippingError::NotFound(code)),
            Err(LookupError::Provider(detail)) => {
                let Some(fee) = self.contingency_fee else {
                    return Err(ShippingError::Unavailable(detail));
                };
                warn!(
                    event_name = "shipping.lookup.contingency_fee_applied",
                    postal_code = %postal_code,
                    error = %detail,
                    fee = %fee,
                    "distance lookup failed; applying contingency fee"
                );
                Ok(ShippingQuote {
                    postal_code: postal_code.clone(),
                    fee,
                    human_text: format!("frete {}", format_brl(fee)),
                    resolved_address: format!("CEP {}", postal_code.formatted()),
                    contingency: true,
                })
            }
        }
    }
}

/// `4,2 km`
pub fn format_km(distance_km: Decimal) -> String {
    let rounded = distance_km.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.1} km", rounded).replace('.', ",")
}
