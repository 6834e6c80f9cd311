use std::path::Path;

use tracing::info;
use winquote_agent::GeminiCatalogExtractor;
use winquote_core::audit::TracingAuditSink;
use winquote_core::config::LoadOptions;
use winquote_core::{
    ApplicationError, AuditContext, CatalogError, CatalogStore, CategoryId, ImportError,
    ImportPayload, ImportPipeline, ImportReport, ImportSettings,
};
use winquote_db::{load_catalog_or_defaults, CatalogRepository};

use crate::commands::{
    build_runtime, load_config, new_correlation_id, open_catalog, persistence, CommandResult,
    ErrorClass,
};

const SHOW: &str = "catalog show";
const IMPORT: &str = "catalog import";
const RESET: &str = "catalog reset";

pub fn show(options: &LoadOptions, category: Option<&str>) -> CommandResult {
    let config = match load_config(SHOW, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(SHOW) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let correlation_id = new_correlation_id();
    let result = runtime.block_on(async {
        let repository = open_catalog(&config.catalog).await?;
        let catalog = load_catalog_or_defaults(&repository).await.map_err(persistence)?;
        Ok::<_, ApplicationError>(catalog)
    });
    let catalog = match result {
        Ok(catalog) => catalog,
        Err(error) => return CommandResult::from_application_error(SHOW, error, &correlation_id),
    };

    match category {
        Some(id) => match catalog.get(id) {
            Some(found) => CommandResult::success_with_data(
                SHOW,
                format!("{}: {} options", found.title, found.options.len()),
                serde_json::to_value(found).ok(),
            ),
            None => CommandResult::from_application_error(
                SHOW,
                CatalogError::CategoryNotFound(CategoryId::new(id)).into(),
                &correlation_id,
            ),
        },
        None => CommandResult::success_with_data(
            SHOW,
            format!("{} categories, {} imported options", catalog.len(), imported_count(&catalog)),
            serde_json::to_value(&catalog).ok(),
        ),
    }
}

pub fn import(options: &LoadOptions, file: &Path, mime_type: Option<String>) -> CommandResult {
    let config = match load_config(IMPORT, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let correlation_id = new_correlation_id();
    let settings = ImportSettings::from_config(&config.extraction);
    let payload = match ImportPayload::from_path(file, mime_type, settings.max_file_bytes) {
        Ok(payload) => payload,
        Err(error) => {
            return CommandResult::from_application_error(
                IMPORT,
                ImportError::Input(error).into(),
                &correlation_id,
            );
        }
    };
    let runtime = match build_runtime(IMPORT) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let extractor = GeminiCatalogExtractor::from_config(&config.extraction)
            .map_err(ImportError::Extraction)?;
        let pipeline = ImportPipeline::new(extractor, settings);

        let repository = open_catalog(&config.catalog).await?;
        let mut catalog = load_catalog_or_defaults(&repository).await.map_err(persistence)?;

        let audit = AuditContext::new(None, correlation_id.clone(), "cli");
        let report =
            pipeline.import_with_audit(&mut catalog, payload, &TracingAuditSink, &audit).await?;
        repository.save(&catalog).await.map_err(persistence)?;
        Ok::<_, ApplicationError>(report)
    });

    match result {
        Ok(report) => CommandResult::success_with_data(
            IMPORT,
            import_message(&report),
            serde_json::to_value(&report).ok(),
        ),
        Err(error) => CommandResult::from_application_error(IMPORT, error, &correlation_id),
    }
}

/// Restores the built-in catalog. Without `confirmed` nothing is read or written.
pub fn reset(options: &LoadOptions, confirmed: bool) -> CommandResult {
    if !confirmed {
        return CommandResult::failure(
            RESET,
            ErrorClass::ConfirmationRequired,
            "reset discards every imported option; re-run with --yes to confirm",
        );
    }

    let config = match load_config(RESET, options) {
        Ok(config) => config,
        Err(result) => return result,
    };
    let runtime = match build_runtime(RESET) {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let correlation_id = new_correlation_id();
    let result = runtime.block_on(async {
        let repository = open_catalog(&config.catalog).await?;
        let mut catalog = load_catalog_or_defaults(&repository).await.map_err(persistence)?;
        let discarded = imported_count(&catalog);

        catalog.reset_to_defaults();
        repository.clear().await.map_err(persistence)?;
        info!(
            event_name = "catalog.reset_persisted",
            correlation_id = %correlation_id,
            discarded,
            "stored catalog cleared"
        );
        Ok::<_, ApplicationError>(discarded)
    });

    match result {
        Ok(discarded) => CommandResult::success(
            RESET,
            format!("catalog restored to defaults, {discarded} imported options discarded"),
        ),
        Err(error) => CommandResult::from_application_error(RESET, error, &correlation_id),
    }
}

fn imported_count(catalog: &CatalogStore) -> usize {
    catalog
        .categories()
        .flat_map(|category| category.options.iter())
        .filter(|option| option.is_imported())
        .count()
}

fn import_message(report: &ImportReport) -> String {
    let mut message = format!(
        "imported {} frames and {} sashes from {}",
        report.frames_merged, report.sashes_merged, report.file_name
    );
    if report.rows_rejected > 0 {
        message.push_str(&format!(", {} rows rejected", report.rows_rejected));
    }
    if report.is_partial() {
        let failed: Vec<&str> =
            report.merge_failures.iter().map(|failure| failure.category.as_str()).collect();
        message.push_str(&format!(", merge failed for {}", failed.join(", ")));
    }
    message
}
