use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::cpq::catalog::CatalogStore;
use crate::domain::catalog::{
    CategoryId, OptionId, COLOR_CATEGORY, GLASS_CATEGORY, MATERIAL_CATEGORY, OPENING_CATEGORY,
};
use crate::domain::quote::QuoteState;

/// How a category's selected option contributes to the total.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingBasis {
    /// `area * base_price * price_multiplier`
    PerSquareMeter,
    /// `base_price * price_multiplier`
    Flat,
    /// `base_price`; the multiplier is deliberately ignored.
    FlatBasePrice,
}

/// Categories priced by the engine, in trace order. Anything else is ignored.
pub const PRICING_POLICY: [(&str, PricingBasis); 4] = [
    (MATERIAL_CATEGORY, PricingBasis::PerSquareMeter),
    (GLASS_CATEGORY, PricingBasis::PerSquareMeter),
    (OPENING_CATEGORY, PricingBasis::Flat),
    (COLOR_CATEGORY, PricingBasis::FlatBasePrice),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingTraceStep {
    pub category: CategoryId,
    pub option: OptionId,
    pub basis: PricingBasis,
    pub amount: Decimal,
    /// The selected option is no longer present in the catalog.
    pub stale: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingResult {
    pub area_m2: Decimal,
    pub subtotal: Decimal,
    pub total: Decimal,
    pub steps: Vec<PricingTraceStep>,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, quote: &QuoteState, catalog: &CatalogStore) -> PricingResult;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeterministicPricingEngine;

impl PricingEngine for DeterministicPricingEngine {
    fn price(&self, quote: &QuoteState, catalog: &CatalogStore) -> PricingResult {
        price_quote_with_trace(quote, catalog)
    }
}

/// Estimated total rounded to whole currency units. Never fails; missing
/// selections contribute nothing.
pub fn compute_total(quote: &QuoteState, catalog: &CatalogStore) -> Decimal {
    price_quote_with_trace(quote, catalog).total
}

pub fn price_quote_with_trace(quote: &QuoteState, catalog: &CatalogStore) -> PricingResult {
    let area_m2 = quote.area_m2();

    let steps: Vec<PricingTraceStep> = PRICING_POLICY
        .iter()
        .filter_map(|(category, basis)| {
            let option = quote.selection(category)?;
            let amount = match basis {
                PricingBasis::PerSquareMeter => saturating_mul(
                    saturating_mul(area_m2, option.base_price),
                    option.price_multiplier,
                ),
                PricingBasis::Flat => saturating_mul(option.base_price, option.price_multiplier),
                PricingBasis::FlatBasePrice => option.base_price,
            };
            Some(PricingTraceStep {
                category: CategoryId::new(*category),
                option: option.id.clone(),
                basis: *basis,
                amount,
                stale: !catalog.contains_option(category, option.id.as_str()),
            })
        })
        .collect();

    let subtotal = steps.iter().map(|step| step.amount).fold(Decimal::ZERO, saturating_add);

    PricingResult { area_m2, subtotal, total: round_currency(subtotal), steps }
}

/// Overflow clamps to `Decimal::MAX` or `Decimal::MIN` following the sign of the
/// exact product, so oversized dimensions still price.
pub fn saturating_mul(left: Decimal, right: Decimal) -> Decimal {
    left.checked_mul(right).unwrap_or_else(|| {
        if left.is_sign_negative() == right.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }
    })
}

fn saturating_add(left: Decimal, right: Decimal) -> Decimal {
    left.checked_add(right).unwrap_or_else(|| {
        if right.is_sign_negative() {
            Decimal::MIN
        } else {
            Decimal::MAX
        }
    })
}

/// Half-away-from-zero to whole units.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
}
