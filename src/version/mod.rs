//! Version discovery layer
//!
//! Fetches the versions of a package from several NuGet endpoints, merges
//! them, and corrects their listed/unlisted state.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Sources   │────▶│  Resolver   │────▶│ Calibrator  │
//! │ (fetch)     │     │(merge/sort) │     │(fix listed) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                       │
//!        ▼                                       ▼
//! ┌──────────────────────┐            ┌──────────────────┐
//! │ flat container, reg. │            │ StatusAuthority  │
//! │ api, cli, gallery    │            │ (reg. api, cli)  │
//! └──────────────────────┘            └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`source`]: `VersionSource` and `StatusAuthority` traits
//! - [`sources`]: Concrete sources (flat container, registration, CLI, gallery)
//! - [`resolver`]: Runs sources per `SourceSelector`, deduplicates and sorts
//! - [`calibrator`]: Overwrites listed flags from authoritative sources
//! - [`ordering`]: Ordinal and semantic version ordering
//! - [`error`]: Error types for sources and resolution
//! - [`types`]: `PackageId`, `VersionRecord`, `ResolutionResult`, selectors

pub mod calibrator;
pub mod error;
pub mod ordering;
pub mod resolver;
pub mod source;
pub mod sources;
pub mod types;
