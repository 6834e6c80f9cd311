use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::cpq::defaults::default_categories;
use crate::domain::catalog::{Category, CategoryId, OptionId, ProductOption};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("category `{0}` was not found in the catalog")]
    CategoryNotFound(CategoryId),
    #[error("option `{option}` was not found in category `{category}`")]
    OptionNotFound { category: CategoryId, option: OptionId },
    #[error("catalog serialization failed: {0}")]
    Serialization(String),
}

/// Owns every category and its options for one session.
///
/// Serializes as a map of category id to category, which is the unit handed to
/// the persistence layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogStore {
    categories: BTreeMap<CategoryId, Category>,
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CatalogStore {
    pub fn with_defaults() -> Self {
        Self::from_categories(default_categories())
    }

    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        Self {
            categories: categories
                .into_iter()
                .map(|category| (category.id.clone(), category))
                .collect(),
        }
    }

    pub fn get(&self, category: &str) -> Option<&Category> {
        self.categories.get(category)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn find_option(&self, category: &str, option_id: &str) -> Result<&ProductOption, CatalogError> {
        let target = self
            .get(category)
            .ok_or_else(|| CatalogError::CategoryNotFound(CategoryId::new(category)))?;
        target.find_option(option_id).ok_or_else(|| CatalogError::OptionNotFound {
            category: target.id.clone(),
            option: OptionId::new(option_id),
        })
    }

    pub fn contains_option(&self, category: &str, option_id: &str) -> bool {
        self.get(category).is_some_and(|target| target.contains_option(option_id))
    }

    /// Prepends `new_options` to the category, keeping their order. Existing
    /// options are never removed and ids are not deduplicated.
    pub fn merge_import(
        &mut self,
        category: &str,
        new_options: Vec<ProductOption>,
    ) -> Result<usize, CatalogError> {
        let Some(target) = self.categories.get_mut(category) else {
            warn!(
                event_name = "catalog.merge_rejected",
                category = category,
                "merge target category does not exist"
            );
            return Err(CatalogError::CategoryNotFound(CategoryId::new(category)));
        };

        let added = new_options.len();
        target.options.splice(0..0, new_options);
        info!(
            event_name = "catalog.import_merged",
            category = category,
            added,
            total = target.options.len(),
            "imported options merged into category"
        );
        Ok(added)
    }

    /// Replaces the whole store with the built-in catalog. The replacement is
    /// built before the swap, so the store is never observed half-reset.
    pub fn reset_to_defaults(&mut self) {
        let defaults = Self::with_defaults();
        *self = defaults;
        info!(event_name = "catalog.reset", categories = self.len(), "catalog reset to defaults");
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        serde_json::to_string(self).map_err(|error| CatalogError::Serialization(error.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(raw).map_err(|error| CatalogError::Serialization(error.to_string()))
    }
}
