use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cpq::catalog::CatalogStore;
use crate::cpq::pricing::saturating_mul;
use crate::domain::catalog::{CategoryId, ProductOption};
use crate::errors::DomainError;

pub const DEFAULT_WIDTH_CM: i64 = 120;
pub const DEFAULT_HEIGHT_CM: i64 = 140;
/// Lower bound enforced when leaving the dimensions step.
pub const MIN_DIMENSION_CM: i64 = 30;
/// Upper bound shown by input widgets; not enforced by the wizard.
pub const MAX_DIMENSION_CM: i64 = 500;

const CM2_PER_M2: i64 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionField {
    Width,
    Height,
}

impl DimensionField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Width => "width",
            Self::Height => "height",
        }
    }
}

impl FromStr for DimensionField {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "width" => Ok(Self::Width),
            "height" => Ok(Self::Height),
            other => Err(DomainError::InvariantViolation(format!(
                "unknown dimension `{other}` (expected width|height)"
            ))),
        }
    }
}

/// The in-progress configuration. Only the wizard controller mutates it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteState {
    pub(crate) width: Decimal,
    pub(crate) height: Decimal,
    pub(crate) selections: BTreeMap<CategoryId, ProductOption>,
}

impl Default for QuoteState {
    fn default() -> Self {
        Self::new(Decimal::from(DEFAULT_WIDTH_CM), Decimal::from(DEFAULT_HEIGHT_CM))
    }
}

impl QuoteState {
    pub fn new(width: Decimal, height: Decimal) -> Self {
        Self { width, height, selections: BTreeMap::new() }
    }

    pub fn width(&self) -> Decimal {
        self.width
    }

    pub fn height(&self) -> Decimal {
        self.height
    }

    pub fn dimension(&self, field: DimensionField) -> Decimal {
        match field {
            DimensionField::Width => self.width,
            DimensionField::Height => self.height,
        }
    }

    pub fn area_m2(&self) -> Decimal {
        saturating_mul(self.width, self.height) / Decimal::from(CM2_PER_M2)
    }

    pub fn selection(&self, category: &str) -> Option<&ProductOption> {
        self.selections.get(category)
    }

    pub fn selections(&self) -> &BTreeMap<CategoryId, ProductOption> {
        &self.selections
    }

    pub fn meets_minimum_dimensions(&self) -> bool {
        let minimum = Decimal::from(MIN_DIMENSION_CM);
        self.width >= minimum && self.height >= minimum
    }

    pub fn within_display_bounds(&self) -> bool {
        let maximum = Decimal::from(MAX_DIMENSION_CM);
        self.meets_minimum_dimensions() && self.width <= maximum && self.height <= maximum
    }

    /// Categories whose selected option no longer exists in the catalog, e.g.
    /// after a reset discarded imported options. Selections are kept as-is.
    pub fn stale_selections(&self, catalog: &CatalogStore) -> Vec<CategoryId> {
        self.selections
            .iter()
            .filter(|(category, option)| {
                !catalog.contains_option(category.as_str(), option.id.as_str())
            })
            .map(|(category, _)| category.clone())
            .collect()
    }

    pub(crate) fn set_dimension(&mut self, field: DimensionField, value: Decimal) {
        match field {
            DimensionField::Width => self.width = value,
            DimensionField::Height => self.height = value,
        }
    }

    pub(crate) fn set_selection(&mut self, category: CategoryId, option: ProductOption) {
        self.selections.insert(category, option);
    }
}
