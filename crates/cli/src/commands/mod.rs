pub mod catalog;
pub mod config;
pub mod quote;

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;
use winquote_core::config::{AppConfig, CatalogConfig, LoadOptions};
use winquote_core::{ApplicationError, CatalogError, DomainError, ImportError};
use winquote_db::{connect_from_config, migrations, RepositoryError, SqlCatalogRepository};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Failure classes and the process exit code each one maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    ConfigValidation,
    RuntimeInit,
    Persistence,
    Validation,
    CatalogNotFound,
    ImportInput,
    Extraction,
    ImportBusy,
    OptionNotFound,
    ConfirmationRequired,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigValidation => "config_validation",
            Self::RuntimeInit => "runtime_init",
            Self::Persistence => "persistence",
            Self::Validation => "validation",
            Self::CatalogNotFound => "catalog_not_found",
            Self::ImportInput => "import_input",
            Self::Extraction => "extraction",
            Self::ImportBusy => "import_busy",
            Self::OptionNotFound => "option_not_found",
            Self::ConfirmationRequired => "confirmation_required",
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ConfigValidation => 2,
            Self::RuntimeInit => 3,
            Self::Persistence => 4,
            Self::Validation => 5,
            Self::CatalogNotFound => 6,
            Self::ImportInput => 7,
            Self::Extraction => 8,
            Self::ImportBusy => 9,
            Self::OptionNotFound => 10,
            Self::ConfirmationRequired => 11,
        }
    }

    pub fn of(error: &ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(DomainError::Validation(_))
            | ApplicationError::Domain(DomainError::InvariantViolation(_)) => Self::Validation,
            ApplicationError::Domain(DomainError::Catalog(CatalogError::CategoryNotFound(_))) => {
                Self::CatalogNotFound
            }
            ApplicationError::Domain(DomainError::Catalog(CatalogError::OptionNotFound {
                ..
            })) => Self::OptionNotFound,
            ApplicationError::Domain(DomainError::Catalog(CatalogError::Serialization(_)))
            | ApplicationError::Persistence(_) => Self::Persistence,
            ApplicationError::Import(ImportError::Input(_)) => Self::ImportInput,
            ApplicationError::Import(ImportError::Busy) => Self::ImportBusy,
            ApplicationError::Import(ImportError::Extraction(_)) => Self::Extraction,
            ApplicationError::Configuration(_) => Self::ConfigValidation,
        }
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            correlation_id: None,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(command: &str, class: ErrorClass, message: impl Into<String>) -> Self {
        Self::failure_with_data(command, class, message, None)
    }

    pub fn failure_with_data(
        command: &str,
        class: ErrorClass,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(class.as_str().to_string()),
            message: message.into(),
            correlation_id: None,
            data,
        };
        Self { exit_code: class.exit_code(), output: serialize_payload(payload) }
    }

    /// Reports an application error with the correlation id of the invocation.
    pub fn from_application_error(
        command: &str,
        error: ApplicationError,
        correlation_id: &str,
    ) -> Self {
        let class = ErrorClass::of(&error);
        let message = match &error {
            ApplicationError::Import(ImportError::Extraction(extraction)) => {
                format!("{} ({})", extraction.user_message(), extraction)
            }
            other => other.to_string(),
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(class.as_str().to_string()),
            message,
            correlation_id: Some(correlation_id.to_string()),
            data: None,
        };
        Self { exit_code: class.exit_code(), output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

pub(crate) fn load_config(command: &str, options: &LoadOptions) -> Result<AppConfig, CommandResult> {
    AppConfig::load(options.clone()).map_err(|error| {
        CommandResult::failure(
            command,
            ErrorClass::ConfigValidation,
            format!("configuration issue: {error}"),
        )
    })
}

pub(crate) fn build_runtime(command: &str) -> Result<Runtime, CommandResult> {
    tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(
            command,
            ErrorClass::RuntimeInit,
            format!("failed to initialize async runtime: {error}"),
        )
    })
}

pub(crate) fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Connects to the catalog database and applies pending migrations.
pub(crate) async fn open_catalog(
    config: &CatalogConfig,
) -> Result<SqlCatalogRepository, ApplicationError> {
    let pool = connect_from_config(config).await.map_err(|error| {
        ApplicationError::Persistence(format!("could not open catalog database: {error}"))
    })?;
    migrations::run_pending(&pool).await.map_err(|error| {
        ApplicationError::Persistence(format!("catalog migrations failed: {error}"))
    })?;
    Ok(SqlCatalogRepository::new(pool))
}

pub(crate) fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use winquote_core::{
        ApplicationError, CatalogError, CategoryId, ExtractionError, ImportError,
        ImportInputError, OptionId,
    };

    use super::{CommandResult, ErrorClass};

    #[test]
    fn exit_codes_are_distinct() {
        let classes = [
            ErrorClass::ConfigValidation,
            ErrorClass::RuntimeInit,
            ErrorClass::Persistence,
            ErrorClass::Validation,
            ErrorClass::CatalogNotFound,
            ErrorClass::ImportInput,
            ErrorClass::Extraction,
            ErrorClass::ImportBusy,
            ErrorClass::OptionNotFound,
            ErrorClass::ConfirmationRequired,
        ];
        let mut codes: Vec<u8> = classes.iter().map(ErrorClass::exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), classes.len());
        assert!(!codes.contains(&0));
    }

    #[test]
    fn application_errors_map_to_classes() {
        let option_missing: ApplicationError = CatalogError::OptionNotFound {
            category: CategoryId::new("glass"),
            option: OptionId::new("nope"),
        }
        .into();
        assert_eq!(ErrorClass::of(&option_missing), ErrorClass::OptionNotFound);

        let category_missing: ApplicationError =
            CatalogError::CategoryNotFound(CategoryId::new("roofing")).into();
        assert_eq!(ErrorClass::of(&category_missing), ErrorClass::CatalogNotFound);

        let busy = ApplicationError::Import(ImportError::Busy);
        assert_eq!(ErrorClass::of(&busy), ErrorClass::ImportBusy);

        let input = ApplicationError::Import(ImportInputError::Empty.into());
        assert_eq!(ErrorClass::of(&input), ErrorClass::ImportInput);
    }

    #[test]
    fn extraction_failures_carry_user_message_and_correlation_id() {
        let error = ApplicationError::Import(ImportError::Extraction(
            ExtractionError::configuration("API key missing"),
        ));
        let result = CommandResult::from_application_error("catalog import", error, "req-42");
        assert_eq!(result.exit_code, 8);

        let payload: serde_json::Value = serde_json::from_str(&result.output).expect("json");
        assert_eq!(payload["error_class"], "extraction");
        assert_eq!(payload["correlation_id"], "req-42");
        assert!(payload["message"].as_str().unwrap_or_default().contains("API key missing"));
    }
}
