pub mod audit;
pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod flows;
pub mod import;

pub use audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
pub use cpq::{
    compute_total, CatalogError, CatalogStore, DeterministicPricingEngine, PricingEngine,
    PricingResult,
};
pub use domain::catalog::{Category, CategoryId, OptionId, ProductOption, ProfileType};
pub use domain::quote::{DimensionField, QuoteState};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{QuoteSummary, WizardController, WizardValidationError};
pub use import::{
    CatalogExtractor, ExtractionError, ExtractionErrorKind, ImportError, ImportInputError,
    ImportPayload, ImportPipeline, ImportReport, ImportSettings, ImportStatus,
};
