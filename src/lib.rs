//! NuGet package version management
//!
//! Discovers every published version of a package together with its
//! listed/unlisted state, and applies bulk unlist or deprecate operations
//! across a selection of versions.
//!
//! - [`version`]: version discovery, merging, and status calibration
//! - [`tool`]: locating and driving the `nuget` command-line tool
//! - [`mutation`]: cancellable batch unlist/deprecate engine
//! - [`manager`]: operator-facing facade tying the pieces together

pub mod cancel;
pub mod config;
pub mod manager;
pub mod mutation;
pub mod tool;
pub mod version;
