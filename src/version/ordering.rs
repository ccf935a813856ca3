//! Ordering of resolved versions
//!
//! Two orderings are available and they disagree on multi-digit components:
//! under [`VersionOrdering::Ordinal`] `"2.0.0"` sorts above `"10.0.0"`
//! because `'2' > '1'`, while [`VersionOrdering::Semantic`] puts `10.0.0`
//! first. Ordinal is the default.

use std::cmp::Ordering;

use semver::Version;
use serde::Deserialize;

use crate::version::types::VersionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VersionOrdering {
    /// Byte-wise comparison of the lowercase version strings
    #[default]
    Ordinal,
    /// Semver precedence; tokens that do not parse sort after all
    /// parseable ones and compare ordinally among themselves
    Semantic,
}

impl VersionOrdering {
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self {
            VersionOrdering::Ordinal => a.to_lowercase().cmp(&b.to_lowercase()),
            VersionOrdering::Semantic => {
                match (parse_version(a), parse_version(b)) {
                    (Some(va), Some(vb)) => va
                        .cmp(&vb)
                        .then_with(|| a.to_lowercase().cmp(&b.to_lowercase())),
                    (Some(_), None) => Ordering::Greater,
                    (None, Some(_)) => Ordering::Less,
                    (None, None) => a.to_lowercase().cmp(&b.to_lowercase()),
                }
            }
        }
    }

    /// Sorts highest first
    pub fn sort_descending(&self, records: &mut [VersionRecord]) {
        records.sort_by(|a, b| self.compare(&b.version, &a.version));
    }
}

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// - "1" -> 1.0.0
/// - "1.2" -> 1.2.0
/// - "v1.2.3" -> 1.2.3
///
/// Four-part NuGet versions such as "1.2.3.4" do not parse.
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.strip_prefix(['v', 'V']).unwrap_or(version);
    let (core, rest) = match version.find(['-', '+']) {
        Some(idx) => version.split_at(idx),
        None => (version, ""),
    };
    let parts: Vec<&str> = core.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0{}", parts[0], rest),
        2 => format!("{}.{}.0{}", parts[0], parts[1], rest),
        _ => version.to_string(),
    };
    Version::parse(&normalized).ok()
}
