//! Common types shared by version sources, the resolver, and the calibrator

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::version::ordering::VersionOrdering;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageIdError {
    #[error("Package id must not be empty")]
    Empty,

    #[error("Package id contains whitespace: {0:?}")]
    Whitespace(String),
}

/// Case-insensitive package identifier
///
/// The original spelling is kept for display; [`PackageId::normalized`] is
/// what goes into URLs and tool command lines.
#[derive(Debug, Clone)]
pub struct PackageId {
    name: String,
    normalized: String,
}

impl PackageId {
    pub fn new(name: &str) -> Result<Self, PackageIdError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PackageIdError::Empty);
        }
        if name.chars().any(char::is_whitespace) {
            return Err(PackageIdError::Whitespace(name.to_string()));
        }
        Ok(Self {
            name: name.to_string(),
            normalized: name.to_lowercase(),
        })
    }

    /// Name as supplied by the operator
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Lowercase form used in every URL and command
    pub fn normalized(&self) -> &str {
        &self.normalized
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for PackageId {}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for PackageId {
    type Err = PackageIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A single published version and whether it shows up in search results
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: String,
    pub listed: bool,
}

impl VersionRecord {
    pub fn new(version: impl Into<String>, listed: bool) -> Self {
        Self {
            version: version.into(),
            listed,
        }
    }

    pub fn listed(version: impl Into<String>) -> Self {
        Self::new(version, true)
    }

    pub fn unlisted(version: impl Into<String>) -> Self {
        Self::new(version, false)
    }

    /// Deduplication key: the version compared case-insensitively
    pub fn key(&self) -> String {
        version_key(&self.version)
    }
}

pub fn version_key(version: &str) -> String {
    version.to_lowercase()
}

/// Deduplicated, sorted set of versions for one package
///
/// Only constructible through [`ResolutionResult::from_records`], which
/// enforces the uniqueness and ordering invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionResult {
    records: Vec<VersionRecord>,
}

impl ResolutionResult {
    /// Deduplicates (first occurrence of each key wins) and sorts
    /// descending according to `ordering`.
    pub fn from_records(records: Vec<VersionRecord>, ordering: VersionOrdering) -> Self {
        let mut unique: indexmap::IndexMap<String, VersionRecord> = indexmap::IndexMap::new();
        for record in records {
            unique.entry(record.key()).or_insert(record);
        }

        let mut records: Vec<VersionRecord> = unique.into_values().collect();
        ordering.sort_descending(&mut records);

        Self { records }
    }

    pub fn records(&self) -> &[VersionRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<VersionRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, version: &str) -> Option<&VersionRecord> {
        let key = version_key(version);
        self.records.iter().find(|r| r.key() == key)
    }

    pub fn listed_count(&self) -> usize {
        self.records.iter().filter(|r| r.listed).count()
    }

    pub fn unlisted_count(&self) -> usize {
        self.len() - self.listed_count()
    }

    pub fn listed_versions(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.listed)
            .map(|r| r.version.clone())
            .collect()
    }
}

/// Identifies a concrete version source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    FlatContainer,
    Registration,
    CliTool,
    Gallery,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::FlatContainer => "package base address",
            SourceKind::Registration => "registration api",
            SourceKind::CliTool => "nuget cli",
            SourceKind::Gallery => "gallery web page",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator's choice of where versions come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceSelector {
    #[default]
    PackageBaseAddress,
    RegistrationApi,
    CliTool,
    WebScrape,
    Comprehensive,
}

impl SourceSelector {
    /// Maps the operator's numbered choice; anything unknown falls back to
    /// the flat-list source.
    pub fn from_index(index: usize) -> Self {
        match index {
            1 => SourceSelector::RegistrationApi,
            2 => SourceSelector::CliTool,
            3 => SourceSelector::WebScrape,
            4 => SourceSelector::Comprehensive,
            _ => SourceSelector::PackageBaseAddress,
        }
    }

    /// Parses a selector name; unknown names fall back to the flat-list source.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "registration" | "registrationapi" => SourceSelector::RegistrationApi,
            "cli" | "clitool" | "nuget" => SourceSelector::CliTool,
            "web" | "webscrape" | "gallery" => SourceSelector::WebScrape,
            "all" | "comprehensive" => SourceSelector::Comprehensive,
            _ => SourceSelector::PackageBaseAddress,
        }
    }

    /// Sources to run, in precedence order
    pub fn plan(&self) -> Vec<SourceKind> {
        match self {
            SourceSelector::PackageBaseAddress => vec![SourceKind::FlatContainer],
            SourceSelector::RegistrationApi => vec![SourceKind::Registration],
            SourceSelector::CliTool => vec![SourceKind::CliTool],
            SourceSelector::WebScrape => vec![SourceKind::Gallery],
            SourceSelector::Comprehensive => {
                vec![SourceKind::FlatContainer, SourceKind::Registration]
            }
        }
    }
}
