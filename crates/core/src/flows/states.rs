use serde::{Deserialize, Serialize};

use crate::domain::catalog::{
    CategoryId, COLOR_CATEGORY, GLASS_CATEGORY, MATERIAL_CATEGORY, OPENING_CATEGORY,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepKind {
    Dimensions,
    Selection { category: CategoryId },
}

/// One position in the wizard. Steps are configuration, not runtime state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardStep {
    pub id: String,
    pub title: String,
    pub kind: StepKind,
}

impl WizardStep {
    pub fn dimensions(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self { id: id.into(), title: title.into(), kind: StepKind::Dimensions }
    }

    pub fn selection(category: &str, title: impl Into<String>) -> Self {
        Self {
            id: category.to_string(),
            title: title.into(),
            kind: StepKind::Selection { category: CategoryId::new(category) },
        }
    }

    pub fn category(&self) -> Option<&CategoryId> {
        match &self.kind {
            StepKind::Selection { category } => Some(category),
            StepKind::Dimensions => None,
        }
    }
}

pub fn default_steps() -> Vec<WizardStep> {
    vec![
        WizardStep::dimensions("dimensions", "Misure"),
        WizardStep::selection(MATERIAL_CATEGORY, "Materiali"),
        WizardStep::selection(OPENING_CATEGORY, "Apertura"),
        WizardStep::selection(GLASS_CATEGORY, "Vetri"),
        WizardStep::selection(COLOR_CATEGORY, "Colori"),
    ]
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardEvent {
    Advance,
    Retreat,
}

/// Result of a navigation call. `completed` is only ever set by a successful
/// advance on the last step, which leaves the index where it was.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: usize,
    pub to: usize,
    pub event: WizardEvent,
    pub completed: bool,
}
