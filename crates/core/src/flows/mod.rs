pub mod engine;
pub mod states;

pub use engine::{QuoteSummary, SummaryLine, WizardController, WizardValidationError};
pub use states::{default_steps, StepKind, TransitionOutcome, WizardEvent, WizardStep};
