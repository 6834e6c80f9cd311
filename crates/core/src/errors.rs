use thiserror::Error;

use crate::{
    cpq::catalog::CatalogError,
    flows::WizardValidationError,
    import::{ExtractionErrorKind, ImportError},
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] WizardValidationError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Import(#[from] ImportError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl From<CatalogError> for ApplicationError {
    fn from(value: CatalogError) -> Self {
        Self::Domain(DomainError::Catalog(value))
    }
}

impl From<WizardValidationError> for ApplicationError {
    fn from(value: WizardValidationError) -> Self {
        Self::Domain(DomainError::Validation(value))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested catalog entry does not exist.",
            Self::Conflict { .. } => "An import is already in progress. Wait for it to finish.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

const UNASSIGNED: &str = "unassigned";

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = UNASSIGNED.to_owned();
        match value {
            ApplicationError::Domain(DomainError::Validation(error)) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Domain(DomainError::InvariantViolation(message)) => {
                Self::BadRequest { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Catalog(CatalogError::Serialization(message))) => {
                Self::Internal { message, correlation_id }
            }
            ApplicationError::Domain(DomainError::Catalog(error)) => {
                Self::NotFound { message: error.to_string(), correlation_id }
            }
            ApplicationError::Import(ImportError::Input(error)) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::Import(ImportError::Busy) => {
                Self::Conflict { message: ImportError::Busy.to_string(), correlation_id }
            }
            ApplicationError::Import(ImportError::Extraction(error)) => match error.kind {
                ExtractionErrorKind::Configuration => {
                    Self::Internal { message: error.user_message().to_owned(), correlation_id }
                }
                ExtractionErrorKind::UnreadableInput | ExtractionErrorKind::NoData => {
                    Self::BadRequest { message: error.user_message().to_owned(), correlation_id }
                }
                ExtractionErrorKind::Transient | ExtractionErrorKind::Timeout => {
                    Self::ServiceUnavailable {
                        message: error.user_message().to_owned(),
                        correlation_id,
                    }
                }
            },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
