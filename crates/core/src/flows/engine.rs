use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::cpq::catalog::{CatalogError, CatalogStore};
use crate::cpq::pricing::{PricingEngine, PricingResult};
use crate::domain::catalog::{CategoryId, ProductOption};
use crate::domain::quote::{DimensionField, QuoteState, MIN_DIMENSION_CM};
use crate::errors::DomainError;
use crate::flows::states::{default_steps, StepKind, TransitionOutcome, WizardEvent, WizardStep};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardValidationError {
    #[error("dimensions {width}x{height} cm are below the {minimum} cm minimum")]
    DimensionsTooSmall { width: Decimal, height: Decimal, minimum: Decimal },
    #[error("select an option for `{category}` to continue")]
    MissingSelection { category: CategoryId },
}

/// Drives the ordered steps and owns the quote being configured.
pub struct WizardController {
    steps: Vec<WizardStep>,
    current: usize,
    quote: QuoteState,
}

impl Default for WizardController {
    fn default() -> Self {
        Self { steps: default_steps(), current: 0, quote: QuoteState::default() }
    }
}

impl WizardController {
    pub fn new(steps: Vec<WizardStep>, quote: QuoteState) -> Result<Self, DomainError> {
        if steps.is_empty() {
            return Err(DomainError::InvariantViolation(
                "wizard requires at least one step".to_string(),
            ));
        }
        Ok(Self { steps, current: 0, quote })
    }

    pub fn steps(&self) -> &[WizardStep] {
        &self.steps
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_step(&self) -> &WizardStep {
        &self.steps[self.current]
    }

    pub fn is_last_step(&self) -> bool {
        self.current + 1 == self.steps.len()
    }

    pub fn progress_pct(&self) -> u8 {
        let pct = (self.current + 1) * 100 / self.steps.len();
        pct.min(100) as u8
    }

    pub fn quote(&self) -> &QuoteState {
        &self.quote
    }

    /// Checks the current step against the quote without moving.
    pub fn validate_current(&self) -> Result<(), WizardValidationError> {
        match &self.current_step().kind {
            StepKind::Dimensions => {
                if self.quote.meets_minimum_dimensions() {
                    Ok(())
                } else {
                    Err(WizardValidationError::DimensionsTooSmall {
                        width: self.quote.width(),
                        height: self.quote.height(),
                        minimum: Decimal::from(MIN_DIMENSION_CM),
                    })
                }
            }
            StepKind::Selection { category } => {
                if self.quote.selection(category.as_str()).is_some() {
                    Ok(())
                } else {
                    Err(WizardValidationError::MissingSelection { category: category.clone() })
                }
            }
        }
    }

    pub fn advance(&mut self) -> Result<TransitionOutcome, WizardValidationError> {
        let from = self.current;
        if let Err(error) = self.validate_current() {
            info!(
                event_name = "wizard.validation_failed",
                step = %self.current_step().id,
                error = %error,
                "step validation failed"
            );
            return Err(error);
        }

        if self.is_last_step() {
            info!(
                event_name = "wizard.configuration_completed",
                step = %self.current_step().id,
                "configuration complete"
            );
            return Ok(TransitionOutcome {
                from,
                to: from,
                event: WizardEvent::Advance,
                completed: true,
            });
        }

        self.current += 1;
        debug!(
            event_name = "wizard.step_advanced",
            from,
            to = self.current,
            step = %self.current_step().id,
            "wizard advanced"
        );
        Ok(TransitionOutcome { from, to: self.current, event: WizardEvent::Advance, completed: false })
    }

    pub fn retreat(&mut self) -> TransitionOutcome {
        let from = self.current;
        self.current = self.current.saturating_sub(1);
        if from != self.current {
            debug!(event_name = "wizard.step_retreated", from, to = self.current, "wizard retreated");
        }
        TransitionOutcome { from, to: self.current, event: WizardEvent::Retreat, completed: false }
    }

    /// Records `option` for `category` without checking it against the catalog.
    pub fn select(&mut self, category: &str, option: ProductOption) {
        debug!(
            event_name = "wizard.option_selected",
            category = category,
            option = %option.id,
            "option selected"
        );
        self.quote.set_selection(CategoryId::new(category), option);
    }

    /// Resolves `option_id` in the catalog's current contents, then selects it.
    pub fn select_from_catalog(
        &mut self,
        catalog: &CatalogStore,
        category: &str,
        option_id: &str,
    ) -> Result<&ProductOption, CatalogError> {
        let option = catalog.find_option(category, option_id)?.clone();
        self.select(category, option);
        self.quote
            .selection(category)
            .ok_or_else(|| CatalogError::CategoryNotFound(CategoryId::new(category)))
    }

    /// No range check here; the minimum is enforced when advancing.
    pub fn set_dimension(&mut self, field: DimensionField, value: Decimal) {
        debug!(
            event_name = "wizard.dimension_set",
            field = field.as_str(),
            value = %value,
            "dimension updated"
        );
        self.quote.set_dimension(field, value);
    }

    /// Starts a fresh configuration on the same step sequence.
    pub fn restart(&mut self) {
        self.current = 0;
        self.quote = QuoteState::default();
    }

    pub fn advance_with_audit<S>(
        &mut self,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, WizardValidationError>
    where
        S: AuditSink,
    {
        let step_id = self.current_step().id.clone();
        let result = self.advance();
        match &result {
            Ok(outcome) => {
                let event_type = if outcome.completed {
                    "wizard.configuration_completed"
                } else {
                    "wizard.step_advanced"
                };
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        event_type,
                        AuditCategory::Wizard,
                        audit.actor.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("step", step_id)
                    .with_metadata("from", outcome.from.to_string())
                    .with_metadata("to", outcome.to.to_string()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::new(
                        audit.session_id.clone(),
                        audit.correlation_id.clone(),
                        "wizard.validation_failed",
                        AuditCategory::Wizard,
                        audit.actor.clone(),
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("step", step_id)
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    pub fn summary<P>(&self, catalog: &CatalogStore, pricing: &P) -> QuoteSummary
    where
        P: PricingEngine,
    {
        let lines = self
            .steps
            .iter()
            .enumerate()
            .filter_map(|(index, step)| {
                let category = step.category()?;
                let selected = self.quote.selection(category.as_str()).map(|o| o.name.clone());
                if index > self.current && selected.is_none() {
                    return None;
                }
                Some(SummaryLine { step_id: step.id.clone(), title: step.title.clone(), selected })
            })
            .collect();

        let pricing = pricing.price(&self.quote, catalog);
        QuoteSummary {
            width_cm: self.quote.width(),
            height_cm: self.quote.height(),
            area_m2: pricing.area_m2.round_dp(2),
            step_index: self.current,
            step_id: self.current_step().id.clone(),
            progress_pct: self.progress_pct(),
            lines,
            stale_selections: self.quote.stale_selections(catalog),
            pricing,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub step_id: String,
    pub title: String,
    /// `None` renders as pending.
    pub selected: Option<String>,
}

/// Read model for the sidebar: dimensions, chosen options and the estimate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub width_cm: Decimal,
    pub height_cm: Decimal,
    pub area_m2: Decimal,
    pub step_index: usize,
    pub step_id: String,
    pub progress_pct: u8,
    pub lines: Vec<SummaryLine>,
    pub stale_selections: Vec<CategoryId>,
    pub pricing: PricingResult,
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rust_decimal::Decimal;

    use crate::audit::{AuditContext, AuditOutcome, InMemoryAuditSink};
    use crate::cpq::catalog::{CatalogError, CatalogStore};
    use crate::cpq::pricing::DeterministicPricingEngine;
    use crate::domain::catalog::CategoryId;
    use crate::domain::quote::{DimensionField, QuoteState};
    use crate::flows::engine::{WizardController, WizardValidationError};
    use crate::flows::states::WizardStep;

    fn complete_selections(controller: &mut WizardController, catalog: &CatalogStore) {
        for (category, option) in
            [("material", "pvc"), ("opening", "battente"), ("glass", "double"), ("color", "white")]
        {
            controller.select_from_catalog(catalog, category, option).expect("default option");
        }
    }

    #[test]
    fn happy_path_reaches_completion_without_moving_past_last_step() {
        let catalog = CatalogStore::with_defaults();
        let mut controller = WizardController::default();
        complete_selections(&mut controller, &catalog);

        for expected in 1..controller.step_count() {
            let outcome = controller.advance().expect("advance");
            assert_eq!(outcome.to, expected);
            assert!(!outcome.completed);
        }

        let last = controller.current_index();
        let outcome = controller.advance().expect("complete");
        assert!(outcome.completed);
        assert_eq!(outcome.to, last);
        assert_eq!(controller.current_index(), last);
        assert_eq!(controller.progress_pct(), 100);
    }

    #[test]
    fn small_dimensions_block_the_first_step() {
        let mut controller = WizardController::default();
        controller.set_dimension(DimensionField::Width, Decimal::from(29));

        let error = controller.advance().expect_err("width below minimum");

        assert!(matches!(error, WizardValidationError::DimensionsTooSmall { .. }));
        assert_eq!(controller.current_index(), 0);
    }

    #[test]
    fn oversized_dimensions_are_accepted() {
        let mut controller = WizardController::default();
        controller.set_dimension(DimensionField::Height, Decimal::from(900));

        assert_eq!(controller.advance().expect("upper bound is advisory").to, 1);
    }

    #[test]
    fn missing_selection_blocks_selection_step() {
        let mut controller = WizardController::default();
        controller.advance().expect("dimensions ok");

        let error = controller.advance().expect_err("material not selected");

        assert_eq!(
            error,
            WizardValidationError::MissingSelection { category: CategoryId::new("material") }
        );
        assert_eq!(controller.current_index(), 1);
    }

    #[test]
    fn retreat_at_first_step_is_a_noop() {
        let mut controller = WizardController::default();
        let outcome = controller.retreat();

        assert_eq!(outcome.from, outcome.to);
        assert_eq!(controller.current_index(), 0);
    }

    #[test]
    fn select_does_not_check_the_catalog() {
        let mut controller = WizardController::default();
        let foreign = crate::domain::catalog::ProductOption::new(
            "custom",
            "Custom",
            "",
            Decimal::from(10),
            Decimal::ONE,
        );
        controller.select("material", foreign);

        assert_eq!(controller.quote().selection("material").map(|o| o.id.as_str()), Some("custom"));
    }

    #[test]
    fn select_from_catalog_reports_unknown_option() {
        let catalog = CatalogStore::with_defaults();
        let mut controller = WizardController::default();

        let error = controller
            .select_from_catalog(&catalog, "glass", "stained")
            .expect_err("unknown option");

        assert!(matches!(error, CatalogError::OptionNotFound { .. }));
        assert!(controller.quote().selection("glass").is_none());
    }

    #[test]
    fn empty_step_sequence_is_rejected() {
        assert!(WizardController::new(Vec::new(), QuoteState::default()).is_err());
    }

    #[test]
    fn single_step_wizard_completes_immediately() {
        let mut controller = WizardController::new(
            vec![WizardStep::dimensions("dimensions", "Misure")],
            QuoteState::default(),
        )
        .expect("one step");

        assert!(controller.is_last_step());
        assert!(controller.advance().expect("valid dimensions").completed);
    }

    #[test]
    fn summary_hides_future_steps_without_selection() {
        let catalog = CatalogStore::with_defaults();
        let mut controller = WizardController::default();
        controller.select_from_catalog(&catalog, "glass", "triple").expect("select glass");
        controller.advance().expect("dimensions ok");

        let summary = controller.summary(&catalog, &DeterministicPricingEngine);
        let visible: Vec<_> = summary.lines.iter().map(|line| line.step_id.as_str()).collect();

        assert_eq!(visible, vec!["material", "glass"]);
        assert_eq!(summary.lines[0].selected, None);
        assert_eq!(summary.area_m2, Decimal::new(168, 2));
        assert_eq!(summary.progress_pct, 40);
    }

    #[test]
    fn restart_returns_to_defaults() {
        let catalog = CatalogStore::with_defaults();
        let mut controller = WizardController::default();
        complete_selections(&mut controller, &catalog);
        controller.advance().expect("advance");

        controller.restart();

        assert_eq!(controller.current_index(), 0);
        assert_eq!(controller.quote(), &QuoteState::default());
    }

    #[test]
    fn advance_emits_audit_events_for_both_outcomes() {
        let sink = InMemoryAuditSink::default();
        let audit = AuditContext::new(Some("session-7".to_string()), "req-1", "wizard");
        let mut controller = WizardController::default();

        controller.advance_with_audit(&sink, &audit).expect("dimensions ok");
        let _ = controller.advance_with_audit(&sink, &audit);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "wizard.step_advanced");
        assert_eq!(events[1].event_type, "wizard.validation_failed");
        assert_eq!(events[1].outcome, AuditOutcome::Rejected);
        assert_eq!(events[1].session_id.as_deref(), Some("session-7"));
    }

    #[derive(Clone, Debug)]
    enum Nav {
        Advance,
        Retreat,
        SelectCurrent,
    }

    fn nav_strategy() -> impl Strategy<Value = Nav> {
        prop_oneof![Just(Nav::Advance), Just(Nav::Retreat), Just(Nav::SelectCurrent)]
    }

    proptest! {
        #[test]
        fn index_never_leaves_bounds(script in proptest::collection::vec(nav_strategy(), 0..64)) {
            let catalog = CatalogStore::with_defaults();
            let mut controller = WizardController::default();

            for nav in script {
                match nav {
                    Nav::Advance => { let _ = controller.advance(); }
                    Nav::Retreat => { controller.retreat(); }
                    Nav::SelectCurrent => {
                        if let Some(category) = controller.current_step().category().cloned() {
                            let first = catalog
                                .get(category.as_str())
                                .and_then(|c| c.options.first())
                                .cloned();
                            if let Some(option) = first {
                                controller.select(category.as_str(), option);
                            }
                        }
                    }
                }
                prop_assert!(controller.current_index() < controller.step_count());
            }
        }

        #[test]
        fn undersized_dimensions_never_advance(width in -100i64..30, height in -100i64..600) {
            let mut controller = WizardController::default();
            controller.set_dimension(DimensionField::Width, Decimal::from(width));
            controller.set_dimension(DimensionField::Height, Decimal::from(height));

            let result = controller.advance();
            let is_dimension_error =
                matches!(result, Err(WizardValidationError::DimensionsTooSmall { .. }));
            prop_assert!(is_dimension_error);
            prop_assert_eq!(controller.current_index(), 0);
        }

        #[test]
        fn selection_step_fails_iff_selection_absent(step in 1usize..5, selected in any::<bool>()) {
            let catalog = CatalogStore::with_defaults();
            let mut controller = WizardController::default();
            complete_selections(&mut controller, &catalog);
            for _ in 0..step {
                controller.advance().expect("all selections present");
            }
            let category = controller.current_step().category().cloned().expect("selection step");

            let mut fresh = WizardController::default();
            if selected {
                fresh.select_from_catalog(&catalog, category.as_str(), first_option(&catalog, &category))
                    .expect("select");
            }
            // walk the fresh controller to the same step by selecting earlier categories
            for earlier in controller.steps()[1..step].iter().filter_map(|s| s.category()) {
                fresh.select_from_catalog(&catalog, earlier.as_str(), first_option(&catalog, earlier))
                    .expect("select earlier");
            }
            for _ in 0..step {
                fresh.advance().expect("earlier steps satisfied");
            }

            prop_assert_eq!(fresh.advance().is_ok(), selected);
        }
    }

    fn first_option<'a>(catalog: &'a CatalogStore, category: &CategoryId) -> &'a str {
        catalog
            .get(category.as_str())
            .and_then(|c| c.options.first())
            .map(|o| o.id.as_str())
            .expect("default category has options")
    }
}
