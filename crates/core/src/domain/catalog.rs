use std::borrow::Borrow;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MATERIAL_CATEGORY: &str = "material";
pub const OPENING_CATEGORY: &str = "opening";
pub const GLASS_CATEGORY: &str = "glass";
pub const COLOR_CATEGORY: &str = "color";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub String);

impl CategoryId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for CategoryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub String);

impl OptionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Technical classification carried by options that came from a supplier catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileType {
    Frame,
    Sash,
    Other,
}

impl ProfileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Frame => "frame",
            Self::Sash => "sash",
            Self::Other => "other",
        }
    }
}

/// A selectable product variant. `base_price` is per m² or flat depending on
/// the category it is priced under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    pub id: OptionId,
    pub name: String,
    pub description: String,
    pub base_price: Decimal,
    #[serde(default = "default_multiplier")]
    pub price_multiplier: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_type: Option<ProfileType>,
}

fn default_multiplier() -> Decimal {
    Decimal::ONE
}

impl ProductOption {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        base_price: Decimal,
        price_multiplier: Decimal,
    ) -> Self {
        Self {
            id: OptionId::new(id),
            name: name.into(),
            description: description.into(),
            base_price,
            price_multiplier,
            code: None,
            weight: None,
            category_type: None,
        }
    }

    pub fn with_technical_data(
        mut self,
        code: impl Into<String>,
        weight: Decimal,
        category_type: ProfileType,
    ) -> Self {
        self.code = Some(code.into());
        self.weight = Some(weight);
        self.category_type = Some(category_type);
        self
    }

    pub fn is_imported(&self) -> bool {
        self.code.is_some()
    }
}

/// A group of options presented as one wizard step. Option order is display order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub title: String,
    pub subtitle: String,
    pub options: Vec<ProductOption>,
}

impl Category {
    pub fn new(id: impl Into<String>, title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            id: CategoryId::new(id),
            title: title.into(),
            subtitle: subtitle.into(),
            options: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<ProductOption>) -> Self {
        self.options = options;
        self
    }

    /// First option with the given id; duplicates left behind by imports resolve
    /// to the most recently imported entry.
    pub fn find_option(&self, option_id: &str) -> Option<&ProductOption> {
        self.options.iter().find(|option| option.id.as_str() == option_id)
    }

    pub fn contains_option(&self, option_id: &str) -> bool {
        self.find_option(option_id).is_some()
    }
}
