use rust_decimal::Decimal;
use tracing::info;
use winquote_core::audit::TracingAuditSink;
use winquote_core::config::LoadOptions;
use winquote_core::{
    ApplicationError, AuditContext, DeterministicPricingEngine, DimensionField, QuoteSummary,
    WizardController, WizardValidationError,
};
use winquote_db::load_catalog_or_defaults;

use crate::commands::{
    build_runtime, load_config, new_correlation_id, open_catalog, persistence, CommandResult,
    ErrorClass,
};

const COMMAND: &str = "quote";

#[derive(Debug, Clone, Default)]
pub struct QuoteArgs {
    pub width: Option<Decimal>,
    pub height: Option<Decimal>,
    /// `category=option` pairs, applied in order.
    pub selections: Vec<String>,
    pub back: usize,
}

pub fn run(options: &LoadOptions, args: QuoteArgs) -> CommandResult {
    let selections = match parse_selections(&args.selections) {
        Ok(selections) => selections,
        Err(message) => return CommandResult::failure(COMMAND, ErrorClass::Validation, message),
    };

    let config = match load_config(COMMAND, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(COMMAND) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let correlation_id = new_correlation_id();
    let result = runtime.block_on(async {
        let repository = open_catalog(&config.catalog).await?;
        let catalog = load_catalog_or_defaults(&repository).await.map_err(persistence)?;

        let mut wizard = WizardController::default();
        if let Some(width) = args.width {
            wizard.set_dimension(DimensionField::Width, width);
        }
        if let Some(height) = args.height {
            wizard.set_dimension(DimensionField::Height, height);
        }
        for (category, option) in &selections {
            wizard.select_from_catalog(&catalog, category, option)?;
        }

        let audit = AuditContext::new(None, correlation_id.clone(), "cli");
        let stopped_by = walk_forward(&mut wizard, &audit);
        for _ in 0..args.back {
            wizard.retreat();
        }

        Ok::<_, ApplicationError>((wizard.summary(&catalog, &DeterministicPricingEngine), stopped_by))
    });

    match result {
        Ok((summary, None)) => {
            info!(
                event_name = "quote.priced",
                correlation_id = %correlation_id,
                total = %summary.pricing.total,
                "quote priced"
            );
            CommandResult::success_with_data(
                COMMAND,
                format!("estimated total: {} EUR", summary.pricing.total),
                summary_data(&summary),
            )
        }
        Ok((summary, Some(error))) => CommandResult::failure_with_data(
            COMMAND,
            ErrorClass::Validation,
            format!("stopped at step `{}`: {error}", summary.step_id),
            summary_data(&summary),
        ),
        Err(error) => CommandResult::from_application_error(COMMAND, error, &correlation_id),
    }
}

/// Advances until the wizard completes or a step refuses to move on.
fn walk_forward(
    wizard: &mut WizardController,
    audit: &AuditContext,
) -> Option<WizardValidationError> {
    loop {
        match wizard.advance_with_audit(&TracingAuditSink, audit) {
            Ok(outcome) if outcome.completed => return None,
            Ok(_) => {}
            Err(error) => return Some(error),
        }
    }
}

fn parse_selections(raw: &[String]) -> Result<Vec<(String, String)>, String> {
    raw.iter()
        .map(|entry| match entry.split_once('=') {
            Some((category, option)) if !category.trim().is_empty() && !option.trim().is_empty() => {
                Ok((category.trim().to_string(), option.trim().to_string()))
            }
            _ => Err(format!("invalid selection `{entry}`, expected CATEGORY=OPTION")),
        })
        .collect()
}

fn summary_data(summary: &QuoteSummary) -> Option<serde_json::Value> {
    serde_json::to_value(summary).ok()
}
