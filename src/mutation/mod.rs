//! Batch unlist and deprecate operations
//!
//! - [`types`]: requests, per-item outcomes, batch state
//! - [`mutator`]: `PackageMutator`, implemented by the NuGet CLI
//! - [`engine`]: sequential, cancellable batch runner
//! - [`plan`]: picks which selected versions still need unlisting

pub mod engine;
pub mod mutator;
pub mod plan;
pub mod types;

pub use engine::BatchMutationEngine;
pub use mutator::PackageMutator;
pub use plan::{UnlistPlan, plan_unlist};
pub use types::{
    BatchState, DeprecationNote, DeprecationReason, ItemOutcome, MutationKind, MutationOutcome,
    MutationRequest,
};
