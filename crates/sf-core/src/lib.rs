//! sf-core: shared types, errors, configuration, and pricing.
//!
//! This crate is the foundational dependency for the other sf-* crates,
//! providing the unified error type, the step-type catalogue, application
//! configuration, and the static pricing table.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;
pub mod pricing;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::RunId;
pub use media::{MediaKind, StepType};
pub use pricing::{PricingTable, StepPricing, AUTO_MODEL};
