use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use thiserror::Error;

use crate::cpq::pricing::round_currency;
use crate::domain::catalog::{ProductOption, ProfileType};

pub const COST_PER_KG: i64 = 15;
pub const FRAME_PRICE_MULTIPLIER: i64 = 4;
pub const SASH_PRICE_MULTIPLIER: i64 = 5;
const GRAMS_PER_KG: i64 = 1_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowType {
    Frame,
    Sash,
    Other,
}

impl RowType {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "frame" => Some(Self::Frame),
            "sash" => Some(Self::Sash),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    fn profile_type(self) -> ProfileType {
        match self {
            Self::Frame => ProfileType::Frame,
            Self::Sash => ProfileType::Sash,
            Self::Other => ProfileType::Other,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RowRejection {
    #[error("row is not an object")]
    NotAnObject,
    #[error("row field `{0}` is missing or has the wrong type")]
    MissingField(&'static str),
    #[error("row weight `{0}` is not a finite non-negative number")]
    InvalidWeight(String),
    #[error("row type `{0}` is not one of frame|sash|other")]
    InvalidType(String),
    #[error("article code `{0}` does not produce a usable id")]
    EmptyId(String),
}

/// One validated record from the extraction capability.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRow {
    pub art_code: String,
    pub description: String,
    /// grams per metre
    pub weight: Decimal,
    pub row_type: RowType,
}

impl ImportRow {
    pub fn from_value(value: &Value) -> Result<Self, RowRejection> {
        let object = value.as_object().ok_or(RowRejection::NotAnObject)?;

        let art_code = object
            .get("artCode")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or(RowRejection::MissingField("artCode"))?;
        let description = object
            .get("description")
            .and_then(Value::as_str)
            .ok_or(RowRejection::MissingField("description"))?;
        let raw_weight = object.get("weight").ok_or(RowRejection::MissingField("weight"))?;
        let weight = raw_weight
            .as_f64()
            .and_then(Decimal::from_f64)
            .filter(|weight| !weight.is_sign_negative())
            .ok_or_else(|| RowRejection::InvalidWeight(raw_weight.to_string()))?;
        let raw_type =
            object.get("type").and_then(Value::as_str).ok_or(RowRejection::MissingField("type"))?;
        let row_type =
            RowType::parse(raw_type).ok_or_else(|| RowRejection::InvalidType(raw_type.to_string()))?;

        if option_slug(art_code).is_empty() {
            return Err(RowRejection::EmptyId(art_code.to_string()));
        }

        Ok(Self {
            art_code: art_code.to_string(),
            description: description.trim().to_string(),
            weight: weight.normalize(),
            row_type,
        })
    }

    /// `round(weight_kg * COST_PER_KG * multiplier)`; rows of type `other` have no price.
    pub fn estimated_price(&self) -> Option<Decimal> {
        let multiplier = match self.row_type {
            RowType::Frame => FRAME_PRICE_MULTIPLIER,
            RowType::Sash => SASH_PRICE_MULTIPLIER,
            RowType::Other => return None,
        };
        let kilograms = self.weight / Decimal::from(GRAMS_PER_KG);
        Some(round_currency(kilograms * Decimal::from(COST_PER_KG) * Decimal::from(multiplier)))
    }

    pub fn to_option(&self) -> Option<ProductOption> {
        let price = self.estimated_price()?;
        Some(
            ProductOption::new(
                option_slug(&self.art_code),
                format!("{} - {}", self.art_code, self.description),
                format!("Peso: {} gr/m.", self.weight),
                price,
                Decimal::ONE,
            )
            .with_technical_data(self.art_code.clone(), self.weight, self.row_type.profile_type()),
        )
    }
}

/// Lowercase URL-safe id: whitespace runs become `-`, other unsafe characters are dropped.
pub fn option_slug(art_code: &str) -> String {
    let mut slug = String::with_capacity(art_code.len());
    let mut pending_dash = false;
    for ch in art_code.trim().chars() {
        if ch.is_whitespace() {
            pending_dash = true;
            continue;
        }
        let lower = ch.to_ascii_lowercase();
        if !(lower.is_ascii_alphanumeric() || matches!(lower, '-' | '_' | '.' | '~')) {
            continue;
        }
        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.push(lower);
    }
    slug
}

/// Rows split by merge target, in extraction order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassifiedRows {
    pub frames: Vec<ProductOption>,
    pub sashes: Vec<ProductOption>,
    pub dropped: usize,
    pub rejected: Vec<RowRejection>,
}

impl ClassifiedRows {
    pub fn valid_rows(&self) -> usize {
        self.frames.len() + self.sashes.len() + self.dropped
    }
}

pub fn classify(items: &[Value]) -> ClassifiedRows {
    let mut classified = ClassifiedRows::default();
    for item in items {
        let row = match ImportRow::from_value(item) {
            Ok(row) => row,
            Err(rejection) => {
                classified.rejected.push(rejection);
                continue;
            }
        };
        match (row.row_type, row.to_option()) {
            (RowType::Frame, Some(option)) => classified.frames.push(option),
            (RowType::Sash, Some(option)) => classified.sashes.push(option),
            _ => classified.dropped += 1,
        }
    }
    classified
}
