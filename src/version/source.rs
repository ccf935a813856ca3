//! Traits for querying package versions and listing status

use std::collections::HashMap;

#[cfg(test)]
use mockall::automock;

use crate::version::error::SourceError;
use crate::version::types::{PackageId, SourceKind, VersionRecord, version_key};

/// Records produced by one source, plus notes about partial failures
/// that did not abort the whole query (e.g. one unreachable catalog page)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOutput {
    pub records: Vec<VersionRecord>,
    pub notes: Vec<String>,
}

impl SourceOutput {
    pub fn new(records: Vec<VersionRecord>) -> Self {
        Self {
            records,
            notes: Vec::new(),
        }
    }
}

/// Trait for fetching package versions from one source
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait VersionSource: Send + Sync {
    /// Returns which source this implementation queries
    fn kind(&self) -> SourceKind;

    /// Fetches every version the source knows about
    ///
    /// # Returns
    /// * `Ok(SourceOutput)` - Versions in the order the source reported them
    /// * `Err(SourceError)` - If the source could not be queried at all
    async fn fetch_versions(&self, package: &PackageId) -> Result<SourceOutput, SourceError>;
}

/// Listing status reported by an authoritative source, keyed by version key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    statuses: HashMap<String, bool>,
    /// When true, a version missing from `statuses` is known to be unlisted
    exhaustive: bool,
}

impl StatusSnapshot {
    /// Snapshot with explicit per-version statuses; unknown versions stay untouched
    pub fn partial(entries: impl IntoIterator<Item = (String, bool)>) -> Self {
        Self {
            statuses: entries
                .into_iter()
                .map(|(version, listed)| (version_key(&version), listed))
                .collect(),
            exhaustive: false,
        }
    }

    /// Snapshot built from the complete set of listed versions
    pub fn listed_set(versions: impl IntoIterator<Item = String>) -> Self {
        Self {
            statuses: versions
                .into_iter()
                .map(|version| (version_key(&version), true))
                .collect(),
            exhaustive: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Authoritative listed flag for `version`, if this snapshot knows it
    pub fn status_of(&self, version: &str) -> Option<bool> {
        match self.statuses.get(&version_key(version)) {
            Some(listed) => Some(*listed),
            None if self.exhaustive => Some(false),
            None => None,
        }
    }
}

/// Trait for sources trusted to correct the listed flag of known versions
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait StatusAuthority: Send + Sync {
    fn name(&self) -> &'static str;

    async fn lookup_status(&self, package: &PackageId) -> Result<StatusSnapshot, SourceError>;
}
