pub mod catalog;
pub mod defaults;
pub mod pricing;

pub use catalog::{CatalogError, CatalogStore};
pub use pricing::{
    compute_total, DeterministicPricingEngine, PricingBasis, PricingEngine, PricingResult,
    PricingTraceStep,
};
